//! Application service — hash-gated submission of bulky artifacts.
//!
//! For inventory, catalogs and profiles the server is first asked which
//! digest it already holds; the artifact body is only sent when that digest
//! differs or the server has none. If the server's answer cannot be obtained
//! the round is skipped, never treated as stale.

use std::ffi::OsStr;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::application::ports::{FileHasher, LocalFs, ServerTransport};
use crate::domain::artifact::{
    ArtifactKind, ArtifactOutcome, CatalogHash, RemoteHash, decode_catalog_hashes,
    encode_catalog_hashes, stale_catalogs, submission_encode,
};

/// Identity fields sent alongside every artifact.
#[derive(Debug, Clone, Copy)]
pub struct MachineIdentity<'a> {
    pub serial: &'a str,
    pub key: &'a str,
}

/// Submit the application inventory if the server's copy is stale.
pub fn send_inventory(
    transport: &impl ServerTransport,
    fs: &impl LocalFs,
    hasher: &impl FileHasher,
    path: &Path,
    id: MachineIdentity<'_>,
) -> ArtifactOutcome {
    send_machine_artifact(ArtifactKind::Inventory, transport, fs, hasher, path, id)
}

/// Submit installed configuration profiles if the server's copy is stale.
pub fn send_profiles(
    transport: &impl ServerTransport,
    fs: &impl LocalFs,
    hasher: &impl FileHasher,
    path: &Path,
    id: MachineIdentity<'_>,
) -> ArtifactOutcome {
    send_machine_artifact(ArtifactKind::Profiles, transport, fs, hasher, path, id)
}

fn send_machine_artifact(
    kind: ArtifactKind,
    transport: &impl ServerTransport,
    fs: &impl LocalFs,
    hasher: &impl FileHasher,
    path: &Path,
    id: MachineIdentity<'_>,
) -> ArtifactOutcome {
    let label = kind.label();
    if !fs.exists(path) {
        debug!("no local {label} at {}", path.display());
        return ArtifactOutcome::Skipped(format!("no local {label}"));
    }
    let local_hash = match hasher.sha256_file(path) {
        Ok(hash) => hash,
        Err(e) => {
            warn!("cannot hash {label}: {e:#}");
            return ArtifactOutcome::Skipped(format!("cannot hash {label}"));
        }
    };
    let remote = match transport.get(&kind.hash_endpoint(id.serial)) {
        Ok(response) => RemoteHash::from_response(response.status, &response.body),
        Err(e) => {
            info!("{label} hash query failed: {e:#}");
            RemoteHash::Unavailable
        }
    };
    match remote.needs_submission(&local_hash) {
        None => {
            info!("server {label} hash unavailable; skipping until next run");
            ArtifactOutcome::Skipped(format!("server {label} hash unavailable"))
        }
        Some(false) => {
            debug!("{label} unchanged");
            ArtifactOutcome::UpToDate
        }
        Some(true) => {
            info!("{label} is out of date, submitting");
            let fields = [("serial", id.serial), ("key", id.key)];
            submit(kind, transport, fs, path, &local_hash, &fields)
        }
    }
}

/// Submit every catalog whose hash the server does not hold.
///
/// Returns one `(catalog name, outcome)` per local catalog file.
pub fn send_catalogs(
    transport: &impl ServerTransport,
    fs: &impl LocalFs,
    hasher: &impl FileHasher,
    dir: &Path,
    key: &str,
) -> Vec<(String, ArtifactOutcome)> {
    let local = match local_catalog_hashes(fs, hasher, dir) {
        Ok(local) => local,
        Err(e) => {
            warn!("cannot read catalogs: {e:#}");
            return Vec::new();
        }
    };
    if local.is_empty() {
        return Vec::new();
    }
    let Some(remote) = remote_catalog_hashes(transport, &local, key) else {
        info!("server catalog hashes unavailable; skipping until next run");
        return local
            .into_iter()
            .map(|c| {
                let reason = "server catalog hashes unavailable".to_string();
                (c.name, ArtifactOutcome::Skipped(reason))
            })
            .collect();
    };
    let stale = stale_catalogs(&local, &remote);
    local
        .iter()
        .map(|catalog| {
            let outcome = if stale.contains(&catalog) {
                info!("catalog {} is out of date, submitting", catalog.name);
                let fields = [("name", catalog.name.as_str()), ("key", key)];
                submit(
                    ArtifactKind::Catalog,
                    transport,
                    fs,
                    &dir.join(&catalog.name),
                    &catalog.sha256hash,
                    &fields,
                )
            } else {
                ArtifactOutcome::UpToDate
            };
            (catalog.name.clone(), outcome)
        })
        .collect()
}

fn local_catalog_hashes(
    fs: &impl LocalFs,
    hasher: &impl FileHasher,
    dir: &Path,
) -> Result<Vec<CatalogHash>> {
    if !fs.is_dir(dir) {
        debug!("no catalogs at {}", dir.display());
        return Ok(Vec::new());
    }
    let mut hashes = Vec::new();
    for path in fs.list_dir(dir)? {
        if fs.is_dir(&path) {
            continue;
        }
        let Some(name) = path.file_name().and_then(OsStr::to_str) else {
            continue;
        };
        match hasher.sha256_file(&path) {
            Ok(sha256hash) => hashes.push(CatalogHash {
                name: name.to_string(),
                sha256hash,
            }),
            Err(e) => warn!("cannot hash catalog {name}: {e:#}"),
        }
    }
    Ok(hashes)
}

/// `None` when the server's answer is unknown this cycle.
fn remote_catalog_hashes(
    transport: &impl ServerTransport,
    local: &[CatalogHash],
    key: &str,
) -> Option<Vec<CatalogHash>> {
    let payload = match encode_catalog_hashes(local) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("cannot encode catalog hashes: {e}");
            return None;
        }
    };
    let endpoint = ArtifactKind::Catalog.hash_endpoint("");
    let fields = [("catalogs", payload.as_str()), ("key", key)];
    let response = match transport.post_form(&endpoint, &fields) {
        Ok(response) => response,
        Err(e) => {
            info!("catalog hash query failed: {e:#}");
            return None;
        }
    };
    match response.status {
        200 => match decode_catalog_hashes(&response.body) {
            Ok(remote) => Some(remote),
            Err(e) => {
                warn!("unreadable catalog hash response: {e}");
                None
            }
        },
        404 => Some(Vec::new()),
        status => {
            info!(status, "catalog hash query rejected");
            None
        }
    }
}

fn submit(
    kind: ArtifactKind,
    transport: &impl ServerTransport,
    fs: &impl LocalFs,
    path: &Path,
    hash: &str,
    identity: &[(&str, &str)],
) -> ArtifactOutcome {
    let label = kind.label();
    let encoded = match encode_file(fs, path) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!("cannot encode {label}: {e:#}");
            return ArtifactOutcome::Failed(format!("cannot encode {label}"));
        }
    };
    let mut fields: Vec<(&str, &str)> = identity.to_vec();
    fields.push(("sha256hash", hash));
    fields.push((kind.body_field(), encoded.as_str()));
    match transport.post_form(kind.submit_endpoint(), &fields) {
        Ok(response) if response.is_ok() => ArtifactOutcome::Submitted,
        Ok(response) => {
            warn!(status = response.status, "{label} submission rejected");
            ArtifactOutcome::Failed(format!("server returned HTTP {}", response.status))
        }
        Err(e) => {
            warn!("{label} submission failed: {e:#}");
            ArtifactOutcome::Failed(format!("{e:#}"))
        }
    }
}

fn encode_file(fs: &impl LocalFs, path: &Path) -> Result<String> {
    let bytes = fs.read(path)?;
    submission_encode(&bytes).with_context(|| format!("compressing {}", path.display()))
}
