//! Single-instance guard for the checkin cycle.
//!
//! The lock is an exclusive `flock` on a file in the base directory, held for
//! as long as the returned guard lives. The kernel drops it if the process
//! dies, so a crashed run never blocks the next one.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

use crate::domain::error::AgentError;

/// Held exclusive lock.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Take the lock without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::AlreadyRunning`] if another process holds it, or
    /// an I/O error if the lock file cannot be opened.
    pub fn try_acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("opening lock file {}", path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!("acquired lock at {}", path.display());
                Ok(Self {
                    file,
                    path: path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(AgentError::AlreadyRunning.into())
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("locking {}", path.display()))),
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        tracing::debug!("released lock at {}", self.path.display());
    }
}
