//! Infrastructure implementation of the `ConfigStore` port.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::ConfigStore;
use crate::domain::config::AgentConfig;

/// Environment variable naming an alternate preferences file.
pub const CONFIG_ENV: &str = "SAL_CONFIG";
/// Preferences file used when `SAL_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sal/config.yaml";

/// Production implementation of `ConfigStore` that uses a YAML file on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlConfigStore;

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<AgentConfig> {
        let path = self.path()?;
        if !path.exists() {
            tracing::debug!("no preferences at {}, using defaults", path.display());
            return Ok(AgentConfig::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
    }

    fn path(&self) -> Result<PathBuf> {
        match std::env::var_os(CONFIG_ENV) {
            Some(val) if !val.is_empty() => Ok(PathBuf::from(val)),
            _ => Ok(PathBuf::from(DEFAULT_CONFIG_PATH)),
        }
    }
}
