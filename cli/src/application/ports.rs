//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` — never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::process::Output;

use anyhow::Result;

use crate::domain::{AgentConfig, SubmissionDocument};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Runs one executable unit — a checkin module or plugin script — to
/// completion.
///
/// Every external script is driven through this single capability; the agent
/// never needs to know what language a script is written in.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run `program` with `args`, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process could not be spawned or waited
    /// on. A non-zero exit is reported through `Output::status`.
    async fn run(&self, program: &Path, args: &[&str]) -> Result<Output>;
}

// ── Transport Port ────────────────────────────────────────────────────────────

/// Raw HTTP response as seen by the services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Report sender for the management server.
///
/// Paths are relative to the configured server URL. Non-2xx statuses are
/// returned as responses; only network-level failures are errors.
pub trait ServerTransport {
    /// # Errors
    ///
    /// Returns an error if the server could not be reached.
    fn get(&self, path: &str) -> Result<HttpResponse>;

    /// POST an `application/x-www-form-urlencoded` body.
    ///
    /// # Errors
    ///
    /// Returns an error if the server could not be reached.
    fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<HttpResponse>;

    /// POST a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the server could not be reached.
    fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<HttpResponse>;
}

// ── State Port ────────────────────────────────────────────────────────────────

/// Durable storage for the in-progress submission document.
#[allow(async_fn_in_trait)]
pub trait SubmissionStore {
    /// Load the persisted document, or an empty one if nothing is stored.
    async fn load_async(&self) -> Result<SubmissionDocument>;
    /// Replace the persisted document.
    async fn save_async(&self, doc: &SubmissionDocument) -> Result<()>;
    /// Forget the persisted document.
    async fn clear_async(&self) -> Result<()>;
}

/// Loads agent preferences.
pub trait ConfigStore {
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    fn load(&self) -> Result<AgentConfig>;
    /// # Errors
    ///
    /// Returns an error if no location can be determined.
    fn path(&self) -> Result<PathBuf>;
}

// ── Filesystem and Hashing Ports ──────────────────────────────────────────────

/// Computes content digests (the checksum store).
pub trait FileHasher {
    /// SHA-256 hex digest of the file's content.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    fn sha256_file(&self, path: &Path) -> Result<String>;
}

/// Filesystem operations the services need.
pub trait LocalFs {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    /// Whether any execute bit is set on a regular file.
    fn is_executable(&self, path: &Path) -> bool;
    /// Whether the "other" write bit is set.
    fn is_world_writable(&self, path: &Path) -> bool;
    /// Entries of `path`, sorted by file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
    /// Remove an empty directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is not empty or cannot be removed.
    fn remove_dir(&self, path: &Path) -> Result<()>;
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    fn remove_file(&self, path: &Path) -> Result<()>;
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    /// Write via a sibling temp file and rename, then apply `mode`.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails; the destination is then untouched.
    fn write_atomic(&self, path: &Path, content: &[u8], mode: u32) -> Result<()>;
}
