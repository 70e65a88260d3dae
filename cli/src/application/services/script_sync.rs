//! Application service — external script synchronization.
//!
//! Keeps `<root>/<plugin>/<filename>` in step with the server's manifest:
//! missing or changed scripts are fetched, everything else is pruned.
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::ffi::OsStr;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::application::ports::{FileHasher, LocalFs, ServerTransport};
use crate::domain::manifest::{Manifest, ScriptDescriptor, parse_script_content};

pub const MANIFEST_ENDPOINT: &str = "preflight-v2";
/// Permissions applied to every fetched script.
pub const SCRIPT_MODE: u32 = 0o755;

/// Counters describing one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Scripts written this pass.
    pub fetched: usize,
    /// Scripts whose local hash already matched.
    pub unchanged: usize,
    /// Scripts that could not be fetched or written.
    pub failed: usize,
    /// Entries deleted because the manifest no longer lists them.
    pub removed: usize,
    /// The whole scripts root was deleted.
    pub wiped: bool,
}

/// Fetch the manifest and apply it to `root`.
///
/// # Errors
///
/// Returns an error only when the local script tree cannot be brought into a
/// known state (directory creation, pruning, or a wipe failed). Network and
/// per-script failures are logged and counted.
pub fn sync_scripts(
    transport: &impl ServerTransport,
    fs: &impl LocalFs,
    hasher: &impl FileHasher,
    root: &Path,
    os_family: &str,
) -> Result<SyncReport> {
    let manifest = fetch_manifest(transport, os_family);
    apply_manifest(transport, fs, hasher, root, &manifest)
}

/// Ask the server which scripts should exist.
pub fn fetch_manifest(transport: &impl ServerTransport, os_family: &str) -> Manifest {
    match transport.post_form(MANIFEST_ENDPOINT, &[("os_family", os_family)]) {
        Ok(response) => {
            let manifest = Manifest::from_response(response.status, &response.body);
            if manifest == Manifest::Absent {
                warn!(status = response.status, "server returned no usable script manifest");
            }
            manifest
        }
        Err(e) => {
            warn!("failed to fetch script manifest: {e:#}");
            Manifest::Absent
        }
    }
}

/// Bring `root` in line with `manifest`.
///
/// # Errors
///
/// See [`sync_scripts`].
pub fn apply_manifest(
    transport: &impl ServerTransport,
    fs: &impl LocalFs,
    hasher: &impl FileHasher,
    root: &Path,
    manifest: &Manifest,
) -> Result<SyncReport> {
    let mut report = SyncReport::default();
    if *manifest == Manifest::Absent {
        report.wiped = wipe(fs, root)?;
        return Ok(report);
    }
    ensure_directories(fs, root, manifest)?;
    reconcile(transport, fs, hasher, root, manifest, &mut report);
    report.removed = prune(fs, root, manifest)?;
    info!(
        fetched = report.fetched,
        unchanged = report.unchanged,
        failed = report.failed,
        removed = report.removed,
        "script sync complete"
    );
    Ok(report)
}

/// Create one directory per distinct plugin, replacing any file in the way.
///
/// # Errors
///
/// Returns an error if an obstacle cannot be removed or a directory cannot
/// be created.
pub fn ensure_directories(fs: &impl LocalFs, root: &Path, manifest: &Manifest) -> Result<()> {
    for plugin in manifest.plugins() {
        let dir = root.join(plugin);
        if fs.exists(&dir) && !fs.is_dir(&dir) {
            debug!("removing file in place of plugin directory {}", dir.display());
            fs.remove_file(&dir)?;
        }
        fs.create_dir_all(&dir)?;
    }
    Ok(())
}

/// Fetch every script that is missing locally or whose hash differs.
///
/// A failed fetch or write leaves the previous file in place.
pub fn reconcile(
    transport: &impl ServerTransport,
    fs: &impl LocalFs,
    hasher: &impl FileHasher,
    root: &Path,
    manifest: &Manifest,
    report: &mut SyncReport,
) {
    for descriptor in manifest.descriptors() {
        if let Err(e) = descriptor.validate() {
            warn!("skipping script descriptor: {e}");
            report.failed += 1;
            continue;
        }
        let path = descriptor.path_under(root);
        if fs.is_dir(&path)
            && let Err(e) = fs.remove_dir_all(&path)
        {
            warn!(
                "directory in place of {}/{} cannot be removed: {e:#}",
                descriptor.plugin, descriptor.filename
            );
            report.failed += 1;
            continue;
        }
        if is_current(fs, hasher, &path, &descriptor.hash) {
            report.unchanged += 1;
            continue;
        }
        let written = fetch_script(transport, descriptor).and_then(|content| {
            fs.write_atomic(&path, content.as_bytes(), SCRIPT_MODE)?;
            Ok(content)
        });
        match written {
            Ok(content) => {
                info!("updated {}/{}", descriptor.plugin, descriptor.filename);
                let actual = crate::domain::checksum::sha256_bytes(content.as_bytes());
                if !actual.eq_ignore_ascii_case(&descriptor.hash) {
                    warn!(
                        expected = %descriptor.hash,
                        %actual,
                        "content of {}/{} does not match its manifest hash",
                        descriptor.plugin,
                        descriptor.filename
                    );
                }
                report.fetched += 1;
            }
            Err(e) => {
                warn!(
                    "failed to update {}/{}: {e:#}",
                    descriptor.plugin, descriptor.filename
                );
                report.failed += 1;
            }
        }
    }
}

/// Delete everything under `root` the manifest does not list, then remove
/// directories left empty. Returns the number of entries deleted.
///
/// # Errors
///
/// Returns an error if a listing or removal fails.
pub fn prune(fs: &impl LocalFs, root: &Path, manifest: &Manifest) -> Result<usize> {
    if !fs.is_dir(root) {
        return Ok(0);
    }
    let keep = manifest.keep_set();
    let mut removed = 0;
    for plugin_dir in fs.list_dir(root)? {
        if !fs.is_dir(&plugin_dir) {
            fs.remove_file(&plugin_dir)?;
            removed += 1;
            continue;
        }
        let plugin = name_of(&plugin_dir);
        for entry in fs.list_dir(&plugin_dir)? {
            let is_dir = fs.is_dir(&entry);
            if !is_dir && keep.contains(&(plugin, name_of(&entry))) {
                continue;
            }
            debug!("removing stale script {}", entry.display());
            if is_dir {
                fs.remove_dir_all(&entry)?;
            } else {
                fs.remove_file(&entry)?;
            }
            removed += 1;
        }
    }
    remove_empty_dirs(fs, root)?;
    Ok(removed)
}

/// Remove `root` entirely.
///
/// An unreachable server is treated exactly like one that revoked every
/// script, so a transient outage also clears the local set.
fn wipe(fs: &impl LocalFs, root: &Path) -> Result<bool> {
    if !fs.exists(root) {
        return Ok(false);
    }
    warn!("removing all external scripts under {}", root.display());
    fs.remove_dir_all(root)
        .with_context(|| format!("wiping external scripts {}", root.display()))?;
    Ok(true)
}

fn is_current(fs: &impl LocalFs, hasher: &impl FileHasher, path: &Path, expected: &str) -> bool {
    if !fs.exists(path) {
        return false;
    }
    match hasher.sha256_file(path) {
        Ok(actual) => actual.eq_ignore_ascii_case(expected),
        Err(e) => {
            debug!("treating {} as changed: {e:#}", path.display());
            false
        }
    }
}

fn fetch_script(transport: &impl ServerTransport, descriptor: &ScriptDescriptor) -> Result<String> {
    let path = format!(
        "{MANIFEST_ENDPOINT}/get-script/{}/{}",
        descriptor.plugin, descriptor.filename
    );
    let response = transport.get(&path)?;
    anyhow::ensure!(response.is_ok(), "server returned HTTP {}", response.status);
    Ok(parse_script_content(&response.body)?)
}

/// Returns `true` if `dir` is empty once its empty subdirectories are gone.
fn remove_empty_dirs(fs: &impl LocalFs, dir: &Path) -> Result<bool> {
    let mut empty = true;
    for entry in fs.list_dir(dir)? {
        if fs.is_dir(&entry) && remove_empty_dirs(fs, &entry)? {
            fs.remove_dir(&entry)?;
        } else {
            empty = false;
        }
    }
    Ok(empty)
}

fn name_of(path: &Path) -> &str {
    path.file_name().and_then(OsStr::to_str).unwrap_or("")
}
