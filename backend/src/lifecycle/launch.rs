// src/lifecycle/launch.rs
//
// First touch: send a connection request to every contact still in `created`.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::automation::ActionKind;
use crate::db::models::{Campaign, CampaignStatus, ContactStatus, MessageTemplate, TemplateType};
use crate::db::{contacts as contact_db, templates as template_db};
use crate::error::{EngineError, EngineResult};
use crate::lifecycle::{transitions, CancelToken, ContactFailure, Engine, LaunchReport};

impl Engine {
    /// Activate the campaign (if needed) and submit a connection request for
    /// each un-contacted contact, oldest first.
    ///
    /// Gateway, generation and template problems are collected per contact.
    /// A storage error stops the batch; contacts already submitted stay so.
    pub async fn launch_campaign(
        &self,
        campaign_id: Uuid,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> EngineResult<LaunchReport> {
        let mut campaign = self.get_campaign(campaign_id).await?;
        match campaign.status {
            CampaignStatus::Completed => {
                return Err(EngineError::CampaignTransition {
                    from: CampaignStatus::Completed,
                    to: CampaignStatus::Active,
                });
            }
            CampaignStatus::Draft | CampaignStatus::Paused => {
                campaign = self
                    .set_campaign_status(campaign_id, CampaignStatus::Active, now)
                    .await?;
            }
            CampaignStatus::Active => {}
        }

        let templates =
            template_db::list_templates(&self.pool, Some(TemplateType::Connection), None).await?;
        let pending =
            contact_db::list_campaign_contacts_in_status(&self.pool, campaign_id, ContactStatus::Created)
                .await?;

        info!(
            "Launching campaign {} ('{}'): {} contacts to invite",
            campaign.id,
            campaign.name,
            pending.len()
        );

        let mut report = LaunchReport {
            campaign_id,
            ..Default::default()
        };

        for contact in pending {
            if cancel.is_cancelled() {
                warn!("Launch of campaign {} cancelled", campaign_id);
                report.aborted = true;
                break;
            }

            match self.invite_contact(&campaign, &templates, contact.id, now).await {
                Ok(true) => report.submitted.push(contact.id),
                Ok(false) => report.skipped += 1,
                Err(err) if err.is_fatal() => {
                    error!("Launch of campaign {} stopped: {}", campaign_id, err);
                    self.locks.prune();
                    return Err(err);
                }
                Err(err) => {
                    warn!("Could not invite contact {}: {}", contact.id, err);
                    report.failures.push(ContactFailure::new(contact.id, &err));
                }
            }
        }

        self.locks.prune();
        info!(
            "Campaign {} launch finished: {} submitted, {} skipped, {} failed{}",
            campaign_id,
            report.submitted.len(),
            report.skipped,
            report.failures.len(),
            if report.aborted { " (aborted)" } else { "" }
        );
        Ok(report)
    }

    /// Returns `false` when the contact is no longer waiting for an invite.
    async fn invite_contact(
        &self,
        campaign: &Campaign,
        templates: &[MessageTemplate],
        contact_id: Uuid,
        now: DateTime<Utc>,
    ) -> EngineResult<bool> {
        let _guard = self.locks.acquire(contact_id).await;

        let Some(contact) = contact_db::get_contact(&self.pool, contact_id).await? else {
            return Ok(false);
        };
        if contact.status != ContactStatus::Created {
            return Ok(false);
        }

        let (message, _) = self
            .compose_message(&contact, templates, TemplateType::Connection, Some(campaign))
            .await?;

        let submission = self
            .automation
            .submit(&contact, ActionKind::Connection, &message)
            .await?;

        let next = transitions::mark_invitation_sent(&contact, &submission, &message, now)?;
        self.commit(&next).await?;

        info!(
            "Invitation sent to {} ({}), handle {}",
            contact.full_name(),
            contact.id,
            submission.external_id
        );
        Ok(true)
    }
}
