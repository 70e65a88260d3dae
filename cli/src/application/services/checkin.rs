//! Application service — checkin module execution and document accumulation.
//!
//! [`Aggregator`] is the only way the checkin cycle touches the submission
//! document. Every mutation is a load → change → save through the injected
//! [`SubmissionStore`], so the persisted copy is never behind the last
//! completed step. Modules may also write the persisted document themselves;
//! reloading before each change keeps their sections.

use std::ffi::OsStr;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::application::ports::{CommandRunner, LocalFs, SubmissionStore};
use crate::domain::submission::SubmissionDocument;

/// Directory entries never treated as modules.
const SKIP_NAMES: &[&str] = &["__pycache__"];

/// Accumulator over the persisted submission document.
pub struct Aggregator<'a, S: SubmissionStore> {
    store: &'a S,
}

impl<'a, S: SubmissionStore> Aggregator<'a, S> {
    #[must_use]
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Current persisted document.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn get(&self) -> Result<SubmissionDocument> {
        self.store.load_async().await
    }

    /// Replace one section and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub async fn set(&self, section: &str, value: Value) -> Result<()> {
        let mut doc = self.get().await?;
        doc.set(section, value);
        self.save(&doc).await
    }

    /// Persist `doc`, overwriting whatever was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub async fn save(&self, doc: &SubmissionDocument) -> Result<()> {
        self.store
            .save_async(doc)
            .await
            .context("saving checkin results")
    }

    /// Forget the persisted document. Only call after the server confirmed it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be cleared.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear_async().await
    }

    /// Run every checkin module in `module_dir` and merge what they print.
    ///
    /// A module reports by printing a JSON object mapping section names to
    /// section values, e.g. `{"Machine": {...}}`. Each entry replaces that
    /// section of the document. Returns one status line per module.
    pub async fn run(
        &self,
        runner: &impl CommandRunner,
        fs: &impl LocalFs,
        module_dir: &Path,
    ) -> Vec<String> {
        let mut statuses = Vec::new();
        if !fs.is_dir(module_dir) {
            debug!("no checkin modules at {}", module_dir.display());
            return statuses;
        }
        let modules = match fs.list_dir(module_dir) {
            Ok(modules) => modules,
            Err(e) => {
                warn!("cannot list checkin modules: {e:#}");
                return statuses;
            }
        };
        for module in modules {
            let name = module.file_name().and_then(OsStr::to_str).unwrap_or("");
            if SKIP_NAMES.contains(&name) || fs.is_dir(&module) {
                continue;
            }
            if fs.is_world_writable(&module) {
                statuses.push(format!(
                    "'{}' is not executable or has bad permissions",
                    module.display()
                ));
                continue;
            }
            let status = match runner.run(&module, &[]).await {
                Ok(output) if output.status.success() => {
                    if let Err(e) = self.merge_stdout(&output.stdout).await {
                        warn!("could not store output of '{}': {e:#}", module.display());
                    }
                    format!("'{}' ran successfully", module.display())
                }
                Ok(output) => {
                    debug!(
                        stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                        "'{}' exited with {}",
                        module.display(),
                        output.status
                    );
                    format!("'{}' had errors during execution!", module.display())
                }
                Err(e) => {
                    debug!("'{}' could not be run: {e:#}", module.display());
                    format!("'{}' had errors during execution!", module.display())
                }
            };
            statuses.push(status);
        }
        statuses
    }

    async fn merge_stdout(&self, stdout: &[u8]) -> Result<()> {
        let Ok(Value::Object(sections)) = serde_json::from_slice::<Value>(stdout) else {
            return Ok(());
        };
        if sections.is_empty() {
            return Ok(());
        }
        let mut doc = self.get().await?;
        for (name, section) in sections {
            doc.set(name, section);
        }
        self.save(&doc).await
    }
}
