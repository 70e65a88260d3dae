//! Secondary artifacts sent through the hash-gated submission protocol.
//!
//! Pure functions only: endpoint naming, hash comparison, and the
//! `base64bz2` wire encoding.

use std::collections::HashMap;
use std::io::{Cursor, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bzip2::Compression;
use bzip2::write::BzEncoder;
use serde::{Deserialize, Serialize};

/// The artifact families the server keeps hashes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Inventory,
    Catalog,
    Profiles,
}

impl ArtifactKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Inventory => "inventory",
            Self::Catalog => "catalog",
            Self::Profiles => "profiles",
        }
    }

    /// Form field carrying the encoded artifact body.
    #[must_use]
    pub fn body_field(self) -> &'static str {
        match self {
            Self::Inventory => "base64bz2inventory",
            Self::Catalog => "base64bz2catalog",
            Self::Profiles => "base64bz2profiles",
        }
    }

    #[must_use]
    pub fn submit_endpoint(self) -> &'static str {
        match self {
            Self::Inventory => "inventory/submit",
            Self::Catalog => "catalog/submit",
            Self::Profiles => "profiles/submit",
        }
    }

    /// Hash query endpoint. Per-machine kinds are keyed by serial; catalogs
    /// are queried in one batch.
    #[must_use]
    pub fn hash_endpoint(self, serial: &str) -> String {
        match self {
            Self::Catalog => "catalog/hash".to_string(),
            Self::Inventory | Self::Profiles => format!("{}/hash/{serial}", self.label()),
        }
    }
}

/// What the server reported about its copy of an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteHash {
    /// The server holds this digest.
    Known(String),
    /// The server has no record of the artifact.
    Missing,
    /// The query failed; the answer is unknown this cycle.
    Unavailable,
}

impl RemoteHash {
    /// A 200 whose body is not a SHA-256 hex digest counts as unavailable.
    #[must_use]
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        match status {
            200 => {
                let digest = String::from_utf8_lossy(body).trim().to_ascii_lowercase();
                if is_sha256_hex(&digest) {
                    Self::Known(digest)
                } else {
                    Self::Unavailable
                }
            }
            404 => Self::Missing,
            _ => Self::Unavailable,
        }
    }

    /// `Some(true)` to submit, `Some(false)` when unchanged, `None` to skip
    /// the round entirely.
    #[must_use]
    pub fn needs_submission(&self, local_hash: &str) -> Option<bool> {
        match self {
            Self::Known(remote) => Some(remote != local_hash),
            Self::Missing => Some(true),
            Self::Unavailable => None,
        }
    }
}

fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Result of one conditional submission round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    /// Server already holds the same content.
    UpToDate,
    Submitted,
    /// Nothing was sent; retried next cycle.
    Skipped(String),
    /// The submit request itself was rejected or failed.
    Failed(String),
}

/// One entry of the batched catalog hash exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogHash {
    pub name: String,
    pub sha256hash: String,
}

/// Serialize local catalog hashes as the XML plist the server expects.
///
/// # Errors
///
/// Returns an error if plist serialization fails.
pub fn encode_catalog_hashes(hashes: &[CatalogHash]) -> Result<String, plist::Error> {
    let mut buf = Vec::new();
    plist::to_writer_xml(&mut buf, &hashes)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Parse the server's catalog hash list.
///
/// # Errors
///
/// Returns an error if `bytes` is not a plist array of `{name, sha256hash}`.
pub fn decode_catalog_hashes(bytes: &[u8]) -> Result<Vec<CatalogHash>, plist::Error> {
    plist::from_reader(Cursor::new(bytes))
}

/// Local catalogs whose hash the server does not already hold.
#[must_use]
pub fn stale_catalogs<'a>(local: &'a [CatalogHash], remote: &[CatalogHash]) -> Vec<&'a CatalogHash> {
    let known: HashMap<&str, &str> = remote
        .iter()
        .map(|c| (c.name.as_str(), c.sha256hash.as_str()))
        .collect();
    local
        .iter()
        .filter(|c| known.get(c.name.as_str()) != Some(&c.sha256hash.as_str()))
        .collect()
}

/// bzip2-compress then base64-encode an artifact body.
///
/// # Errors
///
/// Returns an I/O error if compression fails.
pub fn submission_encode(data: &[u8]) -> std::io::Result<String> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(STANDARD.encode(encoder.finish()?))
}
