//! Application service — one full checkin cycle.
//!
//! Order: seed the `Sal` section, run checkin modules, resolve the run type,
//! sync and run plugins, filter, post the document, then the hash-gated
//! artifacts. Every stage that mutates the document persists it, so a cycle
//! interrupted anywhere before the server's 200 resumes with the data intact.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::application::ports::{
    CommandRunner, FileHasher, LocalFs, ServerTransport, SubmissionStore,
};
use crate::application::services::checkin::Aggregator;
use crate::application::services::conditional::{
    MachineIdentity, send_catalogs, send_inventory, send_profiles,
};
use crate::application::services::filter::{
    remove_blacklisted_messages, remove_skipped_facts, sanitize_submission,
};
use crate::application::services::plugin_runner::{PluginRunReport, run_plugins};
use crate::application::services::script_sync::{SyncReport, sync_scripts};
use crate::domain::artifact::ArtifactOutcome;
use crate::domain::config::AgentConfig;
use crate::domain::submission::{
    DEFAULT_RUN_TYPE, PLUGIN_RESULTS_SECTION, SAL_SECTION, sal_section,
};

/// Endpoint receiving the submission document.
pub const CHECKIN_ENDPOINT: &str = "checkin";

const RUN_MARKER_MODE: u32 = 0o644;

/// Everything a cycle talks to.
pub struct CycleContext<'a, T, F, H, S, R> {
    pub config: &'a AgentConfig,
    pub transport: &'a T,
    pub fs: &'a F,
    pub hasher: &'a H,
    pub store: &'a S,
    pub runner: &'a R,
    /// Reported to the server in the `Sal` section.
    pub agent_version: &'a str,
}

/// What happened during one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub run_type: String,
    pub module_statuses: Vec<String>,
    /// `None` when sync is disabled or failed.
    pub sync: Option<SyncReport>,
    /// `None` when plugins were not run.
    pub plugins: Option<PluginRunReport>,
    /// The server answered 200 and the local document was cleared.
    pub checked_in: bool,
    pub inventory: Option<ArtifactOutcome>,
    pub profiles: Option<ArtifactOutcome>,
    pub catalogs: Vec<(String, ArtifactOutcome)>,
}

/// Run a complete checkin.
///
/// `run_type` overrides the run type found in the document.
///
/// # Errors
///
/// Returns an error when configuration is invalid (before any network
/// activity) or when the submission document cannot be persisted. Server and
/// script failures are logged and reflected in the report.
pub async fn run_cycle<T, F, H, S, R>(
    ctx: &CycleContext<'_, T, F, H, S, R>,
    run_type: Option<&str>,
) -> Result<CycleReport>
where
    T: ServerTransport,
    F: LocalFs,
    H: FileHasher,
    S: SubmissionStore,
    R: CommandRunner,
{
    let settings = ctx.config.server_settings()?;
    let blacklist = ctx.config.blacklist()?;
    let agg = Aggregator::new(ctx.store);
    let mut report = CycleReport::default();

    agg.set(SAL_SECTION, sal_section(&settings.key, ctx.agent_version))
        .await?;

    report.module_statuses = agg
        .run(ctx.runner, ctx.fs, &ctx.config.modules_dir())
        .await;
    for status in &report.module_statuses {
        debug!("{status}");
    }

    report.run_type = match run_type {
        Some(run_type) => run_type.to_string(),
        None => agg
            .get()
            .await?
            .run_type()
            .unwrap_or(DEFAULT_RUN_TYPE)
            .to_string(),
    };
    info!(run_type = %report.run_type, "starting plugin stage");

    let scripts_root = ctx.config.scripts_root();
    let plugins_allowed = if ctx.config.sync_scripts {
        match sync_scripts(
            ctx.transport,
            ctx.fs,
            ctx.hasher,
            &scripts_root,
            &ctx.config.os_family,
        ) {
            Ok(sync) => {
                report.sync = Some(sync);
                true
            }
            Err(e) => {
                warn!("script sync failed, skipping plugins: {e:#}");
                false
            }
        }
    } else {
        true
    };

    if plugins_allowed {
        let (plugins, results) = run_plugins(
            ctx.runner,
            ctx.fs,
            &scripts_root,
            &ctx.config.plugin_results_path(),
            &report.run_type,
        )
        .await;
        agg.set(PLUGIN_RESULTS_SECTION, Value::Array(results)).await?;
        report.plugins = Some(plugins);
    }

    remove_blacklisted_messages(&agg, &blacklist).await?;
    remove_skipped_facts(&agg, &ctx.config.skip_facts).await?;
    sanitize_submission(&agg).await?;

    let doc = agg.get().await?;
    let serial = doc.serial().map(str::to_string);
    let body = serde_json::to_value(&doc).context("serializing submission")?;
    report.checked_in = match ctx.transport.post_json(CHECKIN_ENDPOINT, &body) {
        Ok(response) if response.is_ok() => {
            agg.clear().await?;
            touch_run_marker(ctx);
            info!("checkin accepted");
            true
        }
        Ok(response) => {
            warn!(status = response.status, "checkin rejected; results kept for next run");
            false
        }
        Err(e) => {
            warn!("checkin failed; results kept for next run: {e:#}");
            false
        }
    };

    match serial.as_deref() {
        Some(serial) => {
            let id = MachineIdentity {
                serial,
                key: &settings.key,
            };
            report.inventory = Some(send_inventory(
                ctx.transport,
                ctx.fs,
                ctx.hasher,
                &ctx.config.inventory_path,
                id,
            ));
            report.profiles = Some(send_profiles(
                ctx.transport,
                ctx.fs,
                ctx.hasher,
                &ctx.config.profiles_path,
                id,
            ));
        }
        None => info!("no machine serial reported; skipping inventory and profiles"),
    }
    report.catalogs = send_catalogs(
        ctx.transport,
        ctx.fs,
        ctx.hasher,
        &ctx.config.catalogs_dir,
        &settings.key,
    );

    Ok(report)
}

fn touch_run_marker<T, F: LocalFs, H, S, R>(ctx: &CycleContext<'_, T, F, H, S, R>) {
    let path = ctx.config.run_marker_path();
    let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    if let Err(e) = ctx.fs.write_atomic(&path, stamp.as_bytes(), RUN_MARKER_MODE) {
        warn!("could not update {}: {e:#}", path.display());
    }
}
