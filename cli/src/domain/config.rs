//! Domain types and validators for agent preferences.
//!
//! Pure functions only — no I/O, no async, no filesystem access.

use std::path::PathBuf;

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Constants ────────────────────────────────────────────────────────────────

pub const DEFAULT_BASE_DIR: &str = "/usr/local/sal";
pub const DEFAULT_INVENTORY_PATH: &str = "/Library/Managed Installs/ApplicationInventory.plist";
pub const DEFAULT_CATALOGS_DIR: &str = "/Library/Managed Installs/catalogs";
pub const DEFAULT_PROFILES_PATH: &str = "/usr/local/sal/profiles.plist";
pub const DEFAULT_OS_FAMILY: &str = "Darwin";

// ── Config schema ────────────────────────────────────────────────────────────

/// Agent preferences, stored as YAML (default `/etc/sal/config.yaml`).
///
/// Keys keep the historical preference names (`ServerURL`, `key`, ...) so an
/// exported preference domain can be dropped in unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct AgentConfig {
    /// Base URL of the Sal server.
    #[serde(rename = "ServerURL")]
    pub server_url: Option<String>,
    /// Business unit key.
    #[serde(rename = "key")]
    pub key: Option<String>,
    /// Whether to reconcile the external scripts directory with the server.
    pub sync_scripts: bool,
    /// Send `sal:<key>` as HTTP basic credentials.
    pub basic_auth: bool,
    /// Regexes; matching checkin messages are dropped before submission.
    pub message_blacklist_patterns: Vec<String>,
    /// Fact names removed from every section before submission.
    pub skip_facts: Vec<String>,
    /// Sent with the script manifest request.
    pub os_family: String,
    /// Root of the agent's on-disk state.
    pub base_dir: PathBuf,
    pub inventory_path: PathBuf,
    pub catalogs_dir: PathBuf,
    pub profiles_path: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            key: None,
            sync_scripts: true,
            basic_auth: true,
            message_blacklist_patterns: Vec::new(),
            skip_facts: Vec::new(),
            os_family: DEFAULT_OS_FAMILY.to_string(),
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            inventory_path: PathBuf::from(DEFAULT_INVENTORY_PATH),
            catalogs_dir: PathBuf::from(DEFAULT_CATALOGS_DIR),
            profiles_path: PathBuf::from(DEFAULT_PROFILES_PATH),
        }
    }
}

/// Validated connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Server URL without a trailing slash.
    pub url: String,
    pub key: String,
    pub basic_auth: bool,
}

impl AgentConfig {
    /// Validate the mandatory preferences and return connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequired`] if `key` or `ServerURL` is
    /// unset or blank.
    pub fn server_settings(&self) -> Result<ServerSettings> {
        let key = non_blank(self.key.as_deref()).ok_or(ConfigError::MissingRequired("key"))?;
        let url = non_blank(self.server_url.as_deref())
            .map(|u| u.trim_end_matches('/'))
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingRequired("ServerURL"))?;
        Ok(ServerSettings {
            url: url.to_string(),
            key: key.to_string(),
            basic_auth: self.basic_auth,
        })
    }

    /// Compile `MessageBlacklistPatterns`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] for the first pattern that does
    /// not compile.
    pub fn blacklist(&self) -> Result<Vec<Regex>> {
        self.message_blacklist_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| {
                    anyhow::Error::from(ConfigError::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    })
                })
            })
            .collect()
    }

    /// Directory holding one subdirectory per server-distributed plugin.
    #[must_use]
    pub fn scripts_root(&self) -> PathBuf {
        self.base_dir.join("external_scripts")
    }

    /// Directory of locally installed checkin modules.
    #[must_use]
    pub fn modules_dir(&self) -> PathBuf {
        self.base_dir.join("checkin_modules")
    }

    /// Persisted submission document.
    #[must_use]
    pub fn results_path(&self) -> PathBuf {
        self.base_dir.join("checkin_results.json")
    }

    /// Shared artifact plugins append their results to.
    #[must_use]
    pub fn plugin_results_path(&self) -> PathBuf {
        self.base_dir.join("plugin_results.plist")
    }

    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join("sal-submit.lock")
    }

    /// Touched after every confirmed checkin.
    #[must_use]
    pub fn run_marker_path(&self) -> PathBuf {
        self.base_dir.join("last_run")
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ── Unit tests ───────────────────────────────────────────────────────────────
