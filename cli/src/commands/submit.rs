//! Submit command — one full checkin cycle.

use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::app::AppContext;
use crate::application::services::checkin_cycle::{CycleContext, run_cycle};
use crate::infra::lock::InstanceLock;

/// Arguments for the submit command.
#[derive(Args, Debug, Default)]
pub struct SubmitArgs {
    /// Run type passed to plugins (e.g. auto, manual, custom)
    #[arg(long, value_name = "TYPE")]
    pub run_type: Option<String>,
}

/// Run the submit command.
///
/// # Errors
///
/// Returns an error on invalid preferences, when another run holds the lock,
/// or when the submission document cannot be persisted.
pub async fn run(app: &AppContext, args: &SubmitArgs) -> Result<()> {
    let transport = app.transport()?;
    app.config.blacklist()?;
    let _lock = InstanceLock::try_acquire(&app.config.lock_path())?;

    let ctx = CycleContext {
        config: &app.config,
        transport: &transport,
        fs: &app.fs,
        hasher: &app.fs,
        store: &app.store,
        runner: &app.runner,
        agent_version: env!("CARGO_PKG_VERSION"),
    };
    let report = run_cycle(&ctx, args.run_type.as_deref()).await?;
    info!(
        run_type = %report.run_type,
        modules = report.module_statuses.len(),
        checked_in = report.checked_in,
        "checkin finished"
    );
    Ok(())
}
