//! Domain layer — pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod artifact;
pub mod checksum;
pub mod config;
pub mod error;
pub mod manifest;
pub mod plugin_results;
pub mod submission;

pub use artifact::{ArtifactKind, ArtifactOutcome, CatalogHash, RemoteHash};
pub use config::{AgentConfig, ServerSettings};
pub use error::{AgentError, ConfigError, ManifestError};
pub use manifest::{Manifest, ScriptDescriptor};
pub use submission::SubmissionDocument;
