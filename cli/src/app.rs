//! Application context — unified state passed to every command handler.
//!
//! `AppContext` loads preferences once and owns the production port
//! implementations. The server transport is built on demand because it
//! needs validated server settings.

use anyhow::Result;

use crate::application::ports::ConfigStore;
use crate::domain::config::AgentConfig;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::YamlConfigStore;
use crate::infra::fs::LocalFs;
use crate::infra::http::UreqTransport;
use crate::infra::state::JsonSubmissionStore;

/// Flags passed from the top-level CLI to `AppContext::new`.
#[derive(Debug, Default)]
pub struct AppFlags {
    /// Replaces `ServerURL` from the preferences file.
    pub url: Option<String>,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Effective preferences, CLI overrides applied.
    pub config: AgentConfig,
    pub fs: LocalFs,
    pub runner: TokioCommandRunner,
    /// Persisted submission document.
    pub store: JsonSubmissionStore,
}

impl AppContext {
    /// Load preferences from the default store and apply `flags`.
    ///
    /// # Errors
    ///
    /// Returns an error if the preferences file exists but cannot be parsed.
    pub fn new(flags: &AppFlags) -> Result<Self> {
        Self::with_store(&YamlConfigStore, flags)
    }

    /// Same as [`AppContext::new`] with an explicit config store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot load preferences.
    pub fn with_store(config_store: &impl ConfigStore, flags: &AppFlags) -> Result<Self> {
        let mut config = config_store.load()?;
        if let Some(url) = &flags.url {
            config.server_url = Some(url.clone());
        }
        let store = JsonSubmissionStore::with_path(config.results_path());
        Ok(Self {
            config,
            fs: LocalFs,
            runner: TokioCommandRunner::new(),
            store,
        })
    }

    /// Transport for the configured server.
    ///
    /// # Errors
    ///
    /// Returns an error if `ServerURL` or `key` is missing.
    pub fn transport(&self) -> Result<UreqTransport> {
        Ok(UreqTransport::new(&self.config.server_settings()?))
    }
}
