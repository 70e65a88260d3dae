//! Application service — post-aggregation filtering of the submission.
//!
//! Each pass loads the persisted document, applies one transformation from
//! `crate::domain::submission`, and saves only if something changed.

use anyhow::Result;
use regex::Regex;
use tracing::{debug, info};

use crate::application::ports::SubmissionStore;
use crate::application::services::checkin::Aggregator;
use crate::domain::submission::SubmissionDocument;

/// Drop messages matching any blacklist pattern. Returns whether it saved.
///
/// # Errors
///
/// Returns an error if the document cannot be loaded or saved.
pub async fn remove_blacklisted_messages<S: SubmissionStore>(
    agg: &Aggregator<'_, S>,
    patterns: &[Regex],
) -> Result<bool> {
    if patterns.is_empty() {
        return Ok(false);
    }
    apply(agg, "blacklisted messages", |doc| {
        doc.remove_blacklisted_messages(patterns)
    })
    .await
}

/// Drop facts named in `skip` from every section. Returns whether it saved.
///
/// # Errors
///
/// Returns an error if the document cannot be loaded or saved.
pub async fn remove_skipped_facts<S: SubmissionStore>(
    agg: &Aggregator<'_, S>,
    skip: &[String],
) -> Result<bool> {
    if skip.is_empty() {
        return Ok(false);
    }
    apply(agg, "skipped facts", |doc| doc.remove_skipped_facts(skip)).await
}

/// Remove embedded NUL characters, which break some JSON consumers.
///
/// # Errors
///
/// Returns an error if the document cannot be loaded or saved.
pub async fn sanitize_submission<S: SubmissionStore>(agg: &Aggregator<'_, S>) -> Result<bool> {
    apply(agg, "null bytes", SubmissionDocument::strip_null_bytes).await
}

async fn apply<S, F>(agg: &Aggregator<'_, S>, what: &str, pass: F) -> Result<bool>
where
    S: SubmissionStore,
    F: FnOnce(&mut SubmissionDocument) -> bool,
{
    let mut doc = agg.get().await?;
    if !pass(&mut doc) {
        debug!("no {what} to remove");
        return Ok(false);
    }
    info!("removed {what} from submission");
    agg.save(&doc).await?;
    Ok(true)
}
