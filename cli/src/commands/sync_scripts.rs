//! Sync-scripts command — reconcile plugin scripts without checking in.

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::script_sync::sync_scripts;
use crate::infra::lock::InstanceLock;

/// Run the sync-scripts command.
///
/// # Errors
///
/// Returns an error on invalid preferences, when another run holds the lock,
/// or when the scripts directory cannot be brought into a known state.
pub fn run(app: &AppContext) -> Result<()> {
    let transport = app.transport()?;
    let _lock = InstanceLock::try_acquire(&app.config.lock_path())?;
    let report = sync_scripts(
        &transport,
        &app.fs,
        &app.fs,
        &app.config.scripts_root(),
        &app.config.os_family,
    )?;
    if report.wiped {
        println!("Server sent no manifest; removed all plugin scripts.");
    } else {
        println!(
            "{} fetched, {} unchanged, {} failed, {} removed",
            report.fetched, report.unchanged, report.failed, report.removed
        );
    }
    Ok(())
}
