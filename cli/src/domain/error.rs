//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors raised while validating agent preferences.
///
/// Every variant is fatal: the agent aborts before any file or network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required Sal preference \"{0}\" is not set.")]
    MissingRequired(&'static str),

    #[error("Invalid MessageBlacklistPatterns entry '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

// ── Agent errors ──────────────────────────────────────────────────────────────

/// Errors related to the agent run lifecycle.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Another instance of sal-submit is already running. Exiting.")]
    AlreadyRunning,
}

// ── Manifest errors ───────────────────────────────────────────────────────────

/// Errors produced while decoding server script payloads.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("script payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("script payload contains no content element")]
    MissingContent,

    #[error("unsafe path component '{0}' in script descriptor")]
    UnsafeComponent(String),
}
