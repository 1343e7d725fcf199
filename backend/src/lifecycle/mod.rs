// src/lifecycle/mod.rs
//
// Lifecycle engine: owns campaign/contact state, decides transitions,
// computes follow-up eligibility and picks templates. Talks to the outside
// world only through the automation and generation gateways and the db
// module.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ai::DynMessageGenerator;
use crate::automation::DynAutomationGateway;
use crate::config::{DEFAULT_CONNECTION_TEMPLATE, DEFAULT_FOLLOWUP_TEMPLATE};
use crate::db::models::{
    Campaign, CampaignStatus, Contact, ContactFilter, ContactStatus, NewCampaign,
};
use crate::db::{campaigns as campaign_db, contacts as contact_db, DbPool};
use crate::error::{EngineError, EngineResult};

pub mod analytics;
pub mod contacts;
pub mod eligibility;
pub mod followups;
pub mod launch;
pub mod locks;
pub mod replies;
pub mod sync;
pub mod templates;
pub mod transitions;

#[cfg(test)]
pub(crate) mod test_support;

pub use analytics::Analytics;
pub use locks::{CancelToken, ContactLocks};
pub use replies::ReplyAnalysisReport;
pub use sync::{CampaignFailure, SyncAllReport};

/// Policy knobs handed to the engine at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_followup_attempts: i32,
    pub followup_delay: Duration,
    /// Last-resort connection template.
    pub default_connection_template: Option<String>,
    /// Follow-up template used when no stored one matches. `None` turns
    /// a missing template into a per-contact failure.
    pub default_followup_template: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_followup_attempts: 3,
            followup_delay: Duration::hours(24),
            default_connection_template: Some(DEFAULT_CONNECTION_TEMPLATE.to_string()),
            default_followup_template: Some(DEFAULT_FOLLOWUP_TEMPLATE.to_string()),
        }
    }
}

pub struct Engine {
    pool: DbPool,
    automation: DynAutomationGateway,
    generator: DynMessageGenerator,
    config: EngineConfig,
    locks: ContactLocks,
}

/// One contact that could not be processed in a batch.
#[derive(Debug, Clone, Serialize)]
pub struct ContactFailure {
    pub contact_id: Uuid,
    pub error: String,
}

impl ContactFailure {
    fn new(contact_id: Uuid, error: &EngineError) -> Self {
        Self {
            contact_id,
            error: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LaunchReport {
    pub campaign_id: Uuid,
    /// Contacts whose connection request went out in this run.
    pub submitted: Vec<Uuid>,
    /// Contacts another run had already handled by the time we got to them.
    pub skipped: usize,
    pub failures: Vec<ContactFailure>,
    pub aborted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub contact_id: Uuid,
    pub from: ContactStatus,
    pub to: ContactStatus,
}

/// Result rows the engine could not fold into a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncAnomaly {
    /// No local contact matches the result's key.
    UnmatchedKey { key: String, outcome: String },
    /// The outcome string is not in the mapping table.
    UnknownOutcome { contact_id: Uuid, outcome: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub campaign_id: Uuid,
    pub fetched: usize,
    pub applied: Vec<StatusChange>,
    /// Contacts whose stored state already reflects their latest report.
    pub unchanged: usize,
    /// Older reports for a contact that also has a newer one in the batch.
    pub superseded: usize,
    pub anomalies: Vec<SyncAnomaly>,
    /// Reported outcomes that would break the state machine.
    pub rejected: Vec<StatusChange>,
    pub failures: Vec<ContactFailure>,
    pub aborted: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FollowupReport {
    pub eligible: usize,
    pub sent: Vec<Uuid>,
    /// Contacts that stopped being eligible before we reached them.
    pub skipped: usize,
    /// Messages that fell back to plain placeholder substitution.
    pub generation_fallbacks: usize,
    pub failures: Vec<ContactFailure>,
    pub aborted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvalidRow {
    /// 1-based position in the submitted list.
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub created: Vec<Uuid>,
    /// LinkedIn URLs already present in the campaign.
    pub duplicates: Vec<String>,
    pub invalid: Vec<InvalidRow>,
}

impl Engine {
    pub fn new(
        pool: DbPool,
        automation: DynAutomationGateway,
        generator: DynMessageGenerator,
        config: EngineConfig,
    ) -> Self {
        Self {
            pool,
            automation,
            generator,
            config,
            locks: ContactLocks::new(),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ----- campaigns -----

    pub async fn create_campaign(&self, new: NewCampaign, now: DateTime<Utc>) -> EngineResult<Campaign> {
        if new.name.trim().is_empty() {
            return Err(EngineError::Validation("campaign name must not be empty".into()));
        }

        let campaign = campaign_db::insert_campaign(&self.pool, &new, now).await?;
        info!("Created campaign {} ('{}')", campaign.id, campaign.name);
        Ok(campaign)
    }

    pub async fn get_campaign(&self, id: Uuid) -> EngineResult<Campaign> {
        campaign_db::get_campaign(&self.pool, id)
            .await?
            .ok_or_else(|| EngineError::not_found("campaign", id))
    }

    pub async fn list_campaigns(&self) -> EngineResult<Vec<Campaign>> {
        Ok(campaign_db::list_campaigns(&self.pool).await?)
    }

    pub async fn list_campaigns_by_status(&self, status: CampaignStatus) -> EngineResult<Vec<Campaign>> {
        Ok(campaign_db::list_campaigns_by_status(&self.pool, status).await?)
    }

    /// Move a campaign along draft -> active <-> paused -> completed.
    /// Asking for the current status is a no-op.
    pub async fn set_campaign_status(
        &self,
        id: Uuid,
        next: CampaignStatus,
        now: DateTime<Utc>,
    ) -> EngineResult<Campaign> {
        let campaign = self.get_campaign(id).await?;
        if campaign.status == next {
            return Ok(campaign);
        }
        if !campaign.status.can_transition_to(next) {
            return Err(EngineError::CampaignTransition {
                from: campaign.status,
                to: next,
            });
        }

        if !campaign_db::update_campaign_status(&self.pool, id, campaign.status, next, now).await? {
            return Err(EngineError::Conflict { id });
        }

        info!("Campaign {} moved from {} to {}", id, campaign.status, next);
        self.get_campaign(id).await
    }

    pub async fn delete_campaign(&self, id: Uuid) -> EngineResult<()> {
        if !campaign_db::delete_campaign(&self.pool, id).await? {
            return Err(EngineError::not_found("campaign", id));
        }
        info!("Deleted campaign {} and its contacts", id);
        Ok(())
    }

    // ----- contacts (read side) -----

    pub async fn get_contact(&self, id: Uuid) -> EngineResult<Contact> {
        contact_db::get_contact(&self.pool, id)
            .await?
            .ok_or_else(|| EngineError::not_found("contact", id))
    }

    pub async fn list_contacts(&self, filter: &ContactFilter) -> EngineResult<Vec<Contact>> {
        Ok(contact_db::list_contacts(&self.pool, filter).await?)
    }

    /// Persist `next` over the snapshot it was derived from.
    ///
    /// Callers hold the contact's lock, so a lost race here means another
    /// process wrote the row.
    async fn commit(&self, next: &Contact) -> EngineResult<()> {
        if contact_db::compare_and_set(&self.pool, next).await? {
            Ok(())
        } else {
            warn!("Contact {} changed underneath us (version {})", next.id, next.version);
            Err(EngineError::Conflict { id: next.id })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::test_support::test_engine;

    #[tokio::test]
    async fn test_campaign_status_flow() {
        let (engine, _, _) = test_engine().await;
        let now = Utc::now();
        let campaign = engine
            .create_campaign(
                NewCampaign {
                    name: "Q3 founders".into(),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();
        assert_eq!(campaign.status, CampaignStatus::Draft);

        let active = engine
            .set_campaign_status(campaign.id, CampaignStatus::Active, now)
            .await
            .unwrap();
        assert_eq!(active.status, CampaignStatus::Active);

        let completed = engine
            .set_campaign_status(campaign.id, CampaignStatus::Completed, now)
            .await
            .unwrap();
        assert_eq!(completed.status, CampaignStatus::Completed);

        let err = engine
            .set_campaign_status(campaign.id, CampaignStatus::Active, now)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::CampaignTransition { .. }));
    }

    #[tokio::test]
    async fn test_create_campaign_requires_name() {
        let (engine, _, _) = test_engine().await;
        let err = engine
            .create_campaign(NewCampaign::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_campaign_is_not_found() {
        let (engine, _, _) = test_engine().await;
        let id = Uuid::new_v4();

        assert!(matches!(
            engine.get_campaign(id).await.unwrap_err(),
            EngineError::NotFound { entity: "campaign", .. }
        ));
        assert!(matches!(
            engine.delete_campaign(id).await.unwrap_err(),
            EngineError::NotFound { .. }
        ));
    }
}
