//! Application service — plugin script execution and results harvesting.
//!
//! Each plugin lives in `<root>/<plugin>/` and may contain any number of
//! executables. They run one at a time with the run type as their only
//! argument; a failing script never stops the others. Scripts report back
//! by appending to a shared plist, which is consumed and deleted here.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::application::ports::{CommandRunner, LocalFs};
use crate::domain::plugin_results::parse_plugin_results;

/// Outcome counters for one plugin pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginRunReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Not executable, so never started.
    pub skipped: usize,
}

/// Run every plugin script and return the normalized results.
///
/// The results artifact is removed before returning, whatever happened.
pub async fn run_plugins(
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    root: &Path,
    results_path: &Path,
    run_type: &str,
) -> (PluginRunReport, Vec<Value>) {
    let _cleanup = ArtifactCleanup { fs, path: results_path };
    let report = run_external_scripts(runner, fs, root, run_type).await;
    let results = match read_results(fs, results_path) {
        Ok(results) => results,
        Err(e) => {
            warn!("could not read plugin results: {e:#}");
            Vec::new()
        }
    };
    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        records = results.len(),
        "plugins processed"
    );
    (report, results)
}

/// Execute every executable file one level below each plugin directory.
pub async fn run_external_scripts(
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    root: &Path,
    run_type: &str,
) -> PluginRunReport {
    let mut report = PluginRunReport::default();
    if !fs.is_dir(root) {
        debug!("no external scripts at {}", root.display());
        return report;
    }
    let plugin_dirs = match fs.list_dir(root) {
        Ok(dirs) => dirs,
        Err(e) => {
            warn!("cannot list external scripts: {e:#}");
            return report;
        }
    };
    for dir in plugin_dirs.iter().filter(|p| fs.is_dir(p)) {
        let scripts = match fs.list_dir(dir) {
            Ok(scripts) => scripts,
            Err(e) => {
                warn!("cannot list plugin {}: {e:#}", dir.display());
                continue;
            }
        };
        for script in scripts.iter().filter(|p| !fs.is_dir(p)) {
            if !fs.is_executable(script) {
                warn!("'{}' is not executable or has bad permissions", script.display());
                report.skipped += 1;
                continue;
            }
            match runner.run(script, &[run_type]).await {
                Ok(output) if output.status.success() => {
                    debug!("'{}' ran successfully", script.display());
                    report.succeeded += 1;
                }
                Ok(output) => {
                    warn!(
                        status = %output.status,
                        stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                        "'{}' had errors during execution",
                        script.display()
                    );
                    report.failed += 1;
                }
                Err(e) => {
                    warn!("'{}' could not be run: {e:#}", script.display());
                    report.failed += 1;
                }
            }
        }
    }
    report
}

fn read_results(fs: &impl LocalFs, path: &Path) -> Result<Vec<Value>> {
    if !fs.exists(path) {
        return Ok(Vec::new());
    }
    let bytes = fs.read(path)?;
    parse_plugin_results(&bytes).with_context(|| format!("parsing {}", path.display()))
}

/// Deletes the shared results artifact when dropped.
struct ArtifactCleanup<'a, F: LocalFs> {
    fs: &'a F,
    path: &'a Path,
}

impl<F: LocalFs> Drop for ArtifactCleanup<'_, F> {
    fn drop(&mut self) {
        if self.fs.exists(self.path)
            && let Err(e) = self.fs.remove_file(self.path)
        {
            warn!("failed to remove {}: {e:#}", self.path.display());
        }
    }
}
