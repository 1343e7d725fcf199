// src/lifecycle/sync.rs
//
// Reconciliation: fold gateway-reported outcomes into contact status.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::automation::ActionResult;
use crate::db::contacts as contact_db;
use crate::db::models::{CampaignStatus, Contact, ContactStatus};
use crate::error::{EngineError, EngineResult};
use crate::lifecycle::contacts::normalize_linkedin_url;
use crate::lifecycle::{
    transitions, CancelToken, ContactFailure, Engine, StatusChange, SyncAnomaly, SyncReport,
};

/// Lowercase, and collapse every run of non-alphanumerics into one space.
fn normalize_outcome(raw: &str) -> String {
    raw.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Map a gateway outcome string onto a contact status.
///
/// `None` means the outcome is unknown; the caller records an anomaly.
pub fn map_outcome(raw: &str) -> Option<ContactStatus> {
    let status = match normalize_outcome(raw).as_str() {
        "invitation sent" | "sent" | "pending" => ContactStatus::InvitationSent,
        "invitation accepted" | "accepted" | "connected" => ContactStatus::InvitationAccepted,
        "connection declined" | "declined" | "rejected" => ContactStatus::ConnectionDeclined,
        "no response" | "no reply" | "ignored" => ContactStatus::NoResponse,
        "replied connection request" | "replied" => ContactStatus::RepliedConnectionRequest,
        "replied follow up" | "replied followup" => ContactStatus::RepliedFollowup,
        _ => return None,
    };
    Some(status)
}

/// A campaign that could not be synced.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignFailure {
    pub campaign_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncAllReport {
    pub campaigns: Vec<SyncReport>,
    pub failures: Vec<CampaignFailure>,
    pub aborted: bool,
}

/// What happened to one contact's report.
enum ResultOutcome {
    Applied(StatusChange),
    Unchanged,
    Rejected(StatusChange),
    Anomaly(SyncAnomaly),
    Failed(ContactFailure),
}

/// The report that wins for one contact in a batch.
struct ContactReport {
    contact_id: Uuid,
    target: ContactStatus,
    reply: Option<String>,
    reported_at: DateTime<Utc>,
    key: String,
    outcome: String,
}

impl ContactReport {
    fn new(contact_id: Uuid, target: ContactStatus, result: &ActionResult) -> Self {
        Self {
            contact_id,
            target,
            reply: result.reply_text.clone(),
            reported_at: result.reported_at,
            key: result.key.clone(),
            outcome: result.outcome.clone(),
        }
    }

    /// Keep whichever report is newer; ties go to the one later in the batch.
    /// A reply carried by the older report survives if the newer has none.
    fn merge(&mut self, target: ContactStatus, result: &ActionResult) {
        if result.reported_at >= self.reported_at {
            let older_reply = self.reply.take();
            *self = ContactReport::new(self.contact_id, target, result);
            if self.reply.is_none() {
                self.reply = older_reply;
            }
        } else if self.reply.is_none() {
            self.reply = result.reply_text.clone();
        }
    }
}

impl Engine {
    /// Pull the campaign's results from the automation gateway and reconcile them.
    pub async fn sync_campaign(
        &self,
        campaign_id: Uuid,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> EngineResult<SyncReport> {
        let campaign = self.get_campaign(campaign_id).await?;
        let results = self
            .automation
            .fetch_results(&campaign.id.to_string())
            .await?;

        info!("Fetched {} results for campaign {}", results.len(), campaign_id);
        self.reconcile(campaign_id, results, now, cancel).await
    }

    /// Sync every active campaign in turn.
    ///
    /// A campaign whose results cannot be fetched is listed in `failures`
    /// and the rest still run; a storage error stops everything.
    pub async fn sync_active_campaigns(
        &self,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> EngineResult<SyncAllReport> {
        let mut all = SyncAllReport::default();

        for campaign in self.list_campaigns_by_status(CampaignStatus::Active).await? {
            if cancel.is_cancelled() {
                all.aborted = true;
                break;
            }

            match self.sync_campaign(campaign.id, now, cancel).await {
                Ok(report) => {
                    all.aborted |= report.aborted;
                    all.campaigns.push(report);
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!("Sync of campaign {} failed: {}", campaign.id, err);
                    all.failures.push(CampaignFailure {
                        campaign_id: campaign.id,
                        error: err.to_string(),
                    });
                }
            }
        }

        Ok(all)
    }

    /// Apply a batch of results to a campaign's contacts.
    ///
    /// Only the latest report per contact (by `reported_at`) is applied, so
    /// re-running with the same results changes nothing.
    pub async fn reconcile(
        &self,
        campaign_id: Uuid,
        results: Vec<ActionResult>,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> EngineResult<SyncReport> {
        let mut report = SyncReport {
            campaign_id,
            fetched: results.len(),
            ..Default::default()
        };

        let reports = match self.collect_reports(campaign_id, &results, &mut report, cancel).await {
            Ok(reports) => reports,
            Err(err) => {
                error!("Sync of campaign {} stopped: {}", campaign_id, err);
                return Err(err);
            }
        };

        for contact_report in &reports {
            if report.aborted {
                break;
            }
            if cancel.is_cancelled() {
                warn!("Sync of campaign {} cancelled", campaign_id);
                report.aborted = true;
                break;
            }

            match self.apply_report(contact_report, now).await {
                Ok(ResultOutcome::Applied(change)) => {
                    info!("Contact {}: {} -> {}", change.contact_id, change.from, change.to);
                    report.applied.push(change);
                }
                Ok(ResultOutcome::Unchanged) => report.unchanged += 1,
                Ok(ResultOutcome::Rejected(change)) => {
                    warn!(
                        "Rejected reported transition {} -> {} for contact {}",
                        change.from, change.to, change.contact_id
                    );
                    report.rejected.push(change);
                }
                Ok(ResultOutcome::Anomaly(anomaly)) => {
                    warn!("Sync anomaly in campaign {}: {:?}", campaign_id, anomaly);
                    report.anomalies.push(anomaly);
                }
                Ok(ResultOutcome::Failed(failure)) => {
                    warn!("Could not sync contact {}: {}", failure.contact_id, failure.error);
                    report.failures.push(failure);
                }
                Err(err) => {
                    error!("Sync of campaign {} stopped: {}", campaign_id, err);
                    self.locks.prune();
                    return Err(err);
                }
            }
        }

        self.locks.prune();
        info!(
            "Campaign {} sync finished: {} applied, {} unchanged, {} superseded, {} rejected, {} anomalies{}",
            campaign_id,
            report.applied.len(),
            report.unchanged,
            report.superseded,
            report.rejected.len(),
            report.anomalies.len(),
            if report.aborted { " (aborted)" } else { "" }
        );
        Ok(report)
    }

    /// Match every result to a contact and keep the latest report for each,
    /// in order of first appearance. Unmatched keys and unknown outcomes go
    /// straight into the report as anomalies.
    async fn collect_reports(
        &self,
        campaign_id: Uuid,
        results: &[ActionResult],
        report: &mut SyncReport,
        cancel: &CancelToken,
    ) -> EngineResult<Vec<ContactReport>> {
        let mut reports: Vec<ContactReport> = Vec::new();
        let mut by_contact: HashMap<Uuid, usize> = HashMap::new();

        for result in results {
            if cancel.is_cancelled() {
                warn!("Sync of campaign {} cancelled", campaign_id);
                report.aborted = true;
                break;
            }

            let Some(contact) = self.find_result_contact(campaign_id, result).await? else {
                let anomaly = SyncAnomaly::UnmatchedKey {
                    key: result.key.clone(),
                    outcome: result.outcome.clone(),
                };
                warn!("Sync anomaly in campaign {}: {:?}", campaign_id, anomaly);
                report.anomalies.push(anomaly);
                continue;
            };

            let Some(target) = map_outcome(&result.outcome) else {
                let anomaly = SyncAnomaly::UnknownOutcome {
                    contact_id: contact.id,
                    outcome: result.outcome.clone(),
                };
                warn!("Sync anomaly in campaign {}: {:?}", campaign_id, anomaly);
                report.anomalies.push(anomaly);
                continue;
            };

            match by_contact.get(&contact.id) {
                Some(&index) => {
                    reports[index].merge(target, result);
                    report.superseded += 1;
                }
                None => {
                    by_contact.insert(contact.id, reports.len());
                    reports.push(ContactReport::new(contact.id, target, result));
                }
            }
        }

        Ok(reports)
    }

    /// Match a result to a contact: stored handle first, then profile URL.
    async fn find_result_contact(
        &self,
        campaign_id: Uuid,
        result: &ActionResult,
    ) -> EngineResult<Option<Contact>> {
        if let Some(found) = contact_db::find_by_external_id(&self.pool, campaign_id, &result.key).await? {
            return Ok(Some(found));
        }

        let urls = result.profile_url.iter().chain(std::iter::once(&result.key));
        for url in urls {
            let Ok(normalized) = normalize_linkedin_url(url) else {
                continue;
            };
            if let Some(found) = contact_db::find_by_linkedin_url(&self.pool, campaign_id, &normalized).await? {
                return Ok(Some(found));
            }
        }

        Ok(None)
    }

    /// Only storage errors come back as `Err`.
    async fn apply_report(&self, wanted: &ContactReport, now: DateTime<Utc>) -> EngineResult<ResultOutcome> {
        let _guard = self.locks.acquire(wanted.contact_id).await;

        // Re-read under the lock; a concurrent sync may have applied this already.
        let Some(contact) = contact_db::get_contact(&self.pool, wanted.contact_id).await? else {
            return Ok(ResultOutcome::Anomaly(SyncAnomaly::UnmatchedKey {
                key: wanted.key.clone(),
                outcome: wanted.outcome.clone(),
            }));
        };

        if transitions::is_outdated_report(contact.status, wanted.target) {
            debug!(
                "Ignoring outdated '{}' report for contact {} ({})",
                wanted.outcome, contact.id, contact.status
            );
            return Ok(ResultOutcome::Unchanged);
        }

        let next = match transitions::apply_status(&contact, wanted.target, wanted.reply.as_deref(), now) {
            Ok(Some(next)) => next,
            Ok(None) => return Ok(ResultOutcome::Unchanged),
            Err(EngineError::IllegalTransition { from, to }) => {
                return Ok(ResultOutcome::Rejected(StatusChange {
                    contact_id: contact.id,
                    from,
                    to,
                }))
            }
            Err(err) => return Err(err),
        };

        match self.commit(&next).await {
            Ok(()) => Ok(ResultOutcome::Applied(StatusChange {
                contact_id: contact.id,
                from: contact.status,
                to: next.status,
            })),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => Ok(ResultOutcome::Failed(ContactFailure::new(contact.id, &err))),
        }
    }
}
