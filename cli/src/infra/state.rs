//! Infrastructure implementation of the `SubmissionStore` port.
//!
//! `JsonSubmissionStore` keeps the in-progress document in
//! `checkin_results.json`. Loads and saves run on `spawn_blocking`; saves go
//! through a temp file and rename so an interrupted write never leaves a
//! truncated document behind.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::SubmissionStore;
use crate::domain::submission::SubmissionDocument;
use crate::infra::fs::write_atomic;

const STATE_MODE: u32 = 0o600;

/// Submission document file manager.
#[derive(Debug, Clone)]
pub struct JsonSubmissionStore {
    path: PathBuf,
}

impl JsonSubmissionStore {
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Synchronous load — used internally by `load_async` via `spawn_blocking`.
    ///
    /// A missing or unparseable file yields an empty document: whatever was
    /// stored is not usable data.
    fn load_sync(&self) -> Result<SubmissionDocument> {
        if !self.path.exists() {
            return Ok(SubmissionDocument::new());
        }
        let content = std::fs::read(&self.path)
            .with_context(|| format!("reading results file {}", self.path.display()))?;
        match serde_json::from_slice(&content) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                tracing::warn!("discarding unreadable {}: {e}", self.path.display());
                Ok(SubmissionDocument::new())
            }
        }
    }

    /// Synchronous save — used internally by `save_async` via `spawn_blocking`.
    fn save_sync(&self, doc: &SubmissionDocument) -> Result<()> {
        let content = serde_json::to_vec(doc).context("serializing checkin results")?;
        write_atomic(&self.path, &content, STATE_MODE)
    }

    fn clear_sync(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("removing results file {}", self.path.display()))?;
        }
        Ok(())
    }
}

impl SubmissionStore for JsonSubmissionStore {
    async fn load_async(&self) -> Result<SubmissionDocument> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.load_sync())
            .await
            .context("results load task panicked")?
    }

    async fn save_async(&self, doc: &SubmissionDocument) -> Result<()> {
        let store = self.clone();
        let doc = doc.clone();
        tokio::task::spawn_blocking(move || store.save_sync(&doc))
            .await
            .context("results save task panicked")?
    }

    async fn clear_async(&self) -> Result<()> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.clear_sync())
            .await
            .context("results clear task panicked")?
    }
}
