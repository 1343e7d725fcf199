// src/worker.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::error::EngineResult;
use crate::lifecycle::{CancelToken, Engine};

/// What one pass of the worker did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub campaigns_synced: usize,
    pub sync_failures: usize,
    pub status_changes: usize,
    pub replies_analyzed: usize,
    pub followups_sent: usize,
}

/// Worker entry point.
/// Called when MODE=worker or MODE=both; loops until `cancel` fires.
pub async fn run_worker(engine: Arc<Engine>, interval: Duration, cancel: CancelToken) {
    info!("Worker starting, interval={}s", interval.as_secs());

    loop {
        if cancel.is_cancelled() {
            break;
        }

        match run_cycle(&engine, Utc::now(), &cancel).await {
            Ok(summary) => info!(
                "Worker cycle done: {} campaigns synced ({} failed), {} status changes, {} replies analyzed, {} follow-ups sent",
                summary.campaigns_synced,
                summary.sync_failures,
                summary.status_changes,
                summary.replies_analyzed,
                summary.followups_sent
            ),
            Err(err) => error!("Worker cycle failed: {}", err),
        }

        tokio::select! {
            _ = sleep(interval) => {}
            _ = cancel.cancelled() => break,
        }
    }

    info!("Worker stopped");
}

/// Sync every active campaign, analyze new replies, then send due follow-ups.
///
/// A campaign whose sync fails is logged and skipped; only storage errors
/// end the cycle early.
pub async fn run_cycle(
    engine: &Engine,
    now: DateTime<Utc>,
    cancel: &CancelToken,
) -> EngineResult<CycleSummary> {
    let mut summary = CycleSummary::default();

    let synced = engine.sync_active_campaigns(now, cancel).await?;
    summary.campaigns_synced = synced.campaigns.len();
    summary.sync_failures = synced.failures.len();
    for report in &synced.campaigns {
        summary.status_changes += report.applied.len();
        if !report.anomalies.is_empty() {
            warn!(
                "Campaign {} sync reported {} anomalies",
                report.campaign_id,
                report.anomalies.len()
            );
        }
    }

    if cancel.is_cancelled() {
        return Ok(summary);
    }
    summary.replies_analyzed = engine.analyze_pending_replies(now, cancel).await?.analyzed.len();

    if cancel.is_cancelled() {
        return Ok(summary);
    }
    let report = engine.run_followups(now, cancel).await?;
    summary.followups_sent = report.sent.len();

    Ok(summary)
}
