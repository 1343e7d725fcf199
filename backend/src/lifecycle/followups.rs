// src/lifecycle/followups.rs
//
// Follow-up scan: every eligible contact across active campaigns gets one
// message per run.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::automation::ActionKind;
use crate::db::models::{Contact, MessageTemplate, TemplateType};
use crate::db::{contacts as contact_db, templates as template_db};
use crate::error::EngineResult;
use crate::lifecycle::eligibility::{is_followup_eligible, select_eligible};
use crate::lifecycle::{transitions, CancelToken, ContactFailure, Engine, FollowupReport};

/// Per-contact result of a follow-up attempt.
enum FollowupOutcome {
    /// Sent; `true` when the text fell back to plain template rendering.
    Sent { fell_back: bool },
    NoLongerEligible,
}

impl Engine {
    /// Contacts the next follow-up run would process, oldest first.
    pub async fn eligible_contacts(&self, now: DateTime<Utc>) -> EngineResult<Vec<Contact>> {
        let candidates = contact_db::list_followup_candidates(&self.pool).await?;
        Ok(select_eligible(candidates, &self.config, now))
    }

    /// Send one follow-up to every eligible contact.
    ///
    /// A failed submission leaves the contact untouched so the next scan
    /// retries it. A storage error stops the run.
    pub async fn run_followups(
        &self,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> EngineResult<FollowupReport> {
        let eligible = self.eligible_contacts(now).await?;
        let templates =
            template_db::list_templates(&self.pool, Some(TemplateType::Followup), None).await?;

        let mut report = FollowupReport {
            eligible: eligible.len(),
            ..Default::default()
        };
        info!("Follow-up run: {} eligible contacts", report.eligible);

        for contact in eligible {
            if cancel.is_cancelled() {
                warn!("Follow-up run cancelled");
                report.aborted = true;
                break;
            }

            match self.follow_up(contact.id, &templates, now).await {
                Ok(FollowupOutcome::Sent { fell_back }) => {
                    report.sent.push(contact.id);
                    if fell_back {
                        report.generation_fallbacks += 1;
                    }
                }
                Ok(FollowupOutcome::NoLongerEligible) => report.skipped += 1,
                Err(err) if err.is_fatal() => {
                    error!("Follow-up run stopped: {}", err);
                    self.locks.prune();
                    return Err(err);
                }
                Err(err) => {
                    warn!("Follow-up for contact {} failed: {}", contact.id, err);
                    report.failures.push(ContactFailure::new(contact.id, &err));
                }
            }
        }

        self.locks.prune();
        info!(
            "Follow-up run finished: {} sent, {} skipped, {} failed, {} generation fallbacks{}",
            report.sent.len(),
            report.skipped,
            report.failures.len(),
            report.generation_fallbacks,
            if report.aborted { " (aborted)" } else { "" }
        );
        Ok(report)
    }

    async fn follow_up(
        &self,
        contact_id: Uuid,
        templates: &[MessageTemplate],
        now: DateTime<Utc>,
    ) -> EngineResult<FollowupOutcome> {
        let _guard = self.locks.acquire(contact_id).await;

        // A concurrent run may have sent this one already.
        let Some(contact) = contact_db::get_contact(&self.pool, contact_id).await? else {
            return Ok(FollowupOutcome::NoLongerEligible);
        };
        if !is_followup_eligible(&contact, &self.config, now) {
            return Ok(FollowupOutcome::NoLongerEligible);
        }

        let (message, fell_back) = self
            .compose_message(&contact, templates, TemplateType::Followup, None)
            .await?;

        let submission = self
            .automation
            .submit(&contact, ActionKind::Followup, &message)
            .await?;

        let next = transitions::record_followup(&contact, &submission, &message, now);
        self.commit(&next).await?;

        info!(
            "Follow-up #{} sent to {} ({})",
            next.followup_attempts,
            contact.full_name(),
            contact.id
        );
        Ok(FollowupOutcome::Sent { fell_back })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{CampaignStatus, ContactStatus, NewTemplate, Variant};
    use crate::lifecycle::test_support::{
        action_result, launched_campaign, test_engine, test_engine_with,
    };
    use crate::lifecycle::EngineConfig;
    use chrono::Duration;

    async fn accept_all(engine: &Engine, campaign_id: Uuid, contacts: &[Contact], at: DateTime<Utc>) {
        let results = contacts
            .iter()
            .map(|c| action_result(&c.linkedin_url, "accepted"))
            .collect();
        engine
            .reconcile(campaign_id, results, at, &CancelToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_followup_waits_for_the_delay() {
        let (engine, automation, _) = test_engine().await;
        let t0 = Utc::now();
        let (campaign, contacts) = launched_campaign(&engine, &["jdoe"], t0).await;
        accept_all(&engine, campaign.id, &contacts, t0 + Duration::hours(1)).await;

        let early = engine
            .run_followups(t0 + Duration::hours(23), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(early.eligible, 0);
        assert!(early.sent.is_empty());

        let t25 = t0 + Duration::hours(25);
        let report = engine.run_followups(t25, &CancelToken::new()).await.unwrap();
        assert_eq!(report.sent, vec![contacts[0].id]);

        let stored = engine.get_contact(contacts[0].id).await.unwrap();
        assert_eq!(stored.status, ContactStatus::InvitationAccepted);
        assert_eq!(stored.followup_attempts, 1);
        assert_eq!(stored.last_followup_at, Some(t25));

        let submissions = automation.submissions();
        assert_eq!(submissions.last().unwrap().1, ActionKind::Followup);
    }

    #[tokio::test]
    async fn test_generation_failure_falls_back_to_template() {
        let (engine, automation, generator) = test_engine().await;
        let t0 = Utc::now();
        let (campaign, contacts) = launched_campaign(&engine, &["jdoe"], t0).await;
        accept_all(&engine, campaign.id, &contacts, t0).await;
        engine
            .create_template(
                NewTemplate {
                    name: "Short".into(),
                    variant: Variant::Networking,
                    template_type: TemplateType::Followup,
                    content: "Hi {first_name}, how are things at {company}?".into(),
                },
                t0,
            )
            .await
            .unwrap();

        generator.set_failing(true);
        let report = engine
            .run_followups(t0 + Duration::hours(25), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(report.sent.len(), 1);
        assert_eq!(report.generation_fallbacks, 1);
        let (_, _, message) = automation.submissions().pop().unwrap();
        assert_eq!(message, "Hi John, how are things at Acme?");

        let stored = engine.get_contact(contacts[0].id).await.unwrap();
        assert_eq!(stored.followup_attempts, 1);
        assert_eq!(stored.followup_message.as_deref(), Some("Hi John, how are things at Acme?"));
    }

    #[tokio::test]
    async fn test_gateway_failure_does_not_count_as_attempt() {
        let (engine, automation, _) = test_engine().await;
        let t0 = Utc::now();
        let (campaign, contacts) = launched_campaign(&engine, &["jdoe"], t0).await;
        accept_all(&engine, campaign.id, &contacts, t0).await;

        automation.fail_all(true);
        let t25 = t0 + Duration::hours(25);
        let report = engine.run_followups(t25, &CancelToken::new()).await.unwrap();
        assert_eq!(report.failures.len(), 1);

        let stored = engine.get_contact(contacts[0].id).await.unwrap();
        assert_eq!(stored.followup_attempts, 0);
        assert_eq!(stored.last_followup_at, None);
        assert_eq!(stored.status, ContactStatus::InvitationAccepted);

        automation.fail_all(false);
        let retry = engine.run_followups(t25, &CancelToken::new()).await.unwrap();
        assert_eq!(retry.sent, vec![contacts[0].id]);
    }

    #[tokio::test]
    async fn test_attempts_stop_at_the_cap() {
        let config = EngineConfig {
            max_followup_attempts: 2,
            ..EngineConfig::default()
        };
        let (engine, _, _) = test_engine_with(config).await;
        let t0 = Utc::now();
        let (campaign, contacts) = launched_campaign(&engine, &["jdoe"], t0).await;
        accept_all(&engine, campaign.id, &contacts, t0).await;

        let mut now = t0;
        let mut total_sent = 0;
        for _ in 0..5 {
            now += Duration::hours(25);
            total_sent += engine.run_followups(now, &CancelToken::new()).await.unwrap().sent.len();
        }

        assert_eq!(total_sent, 2);
        assert_eq!(engine.get_contact(contacts[0].id).await.unwrap().followup_attempts, 2);
        assert!(engine.eligible_contacts(now + Duration::days(30)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_declined_and_paused_contacts_are_never_selected() {
        let (engine, _, _) = test_engine().await;
        let t0 = Utc::now();
        let (campaign, contacts) = launched_campaign(&engine, &["jdoe", "asmith"], t0).await;
        engine
            .reconcile(
                campaign.id,
                vec![
                    action_result(&contacts[0].linkedin_url, "declined"),
                    action_result(&contacts[1].linkedin_url, "accepted"),
                ],
                t0,
                &CancelToken::new(),
            )
            .await
            .unwrap();

        let later = t0 + Duration::days(10);
        let eligible = engine.eligible_contacts(later).await.unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, contacts[1].id);

        engine
            .set_campaign_status(campaign.id, CampaignStatus::Paused, later)
            .await
            .unwrap();
        assert!(engine.eligible_contacts(later).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_followup_template_is_a_contact_failure() {
        let config = EngineConfig {
            default_followup_template: None,
            ..EngineConfig::default()
        };
        let (engine, automation, _) = test_engine_with(config).await;
        let t0 = Utc::now();
        let (campaign, contacts) = launched_campaign(&engine, &["jdoe"], t0).await;
        accept_all(&engine, campaign.id, &contacts, t0).await;
        let before = automation.submissions().len();

        let report = engine
            .run_followups(t0 + Duration::hours(25), &CancelToken::new())
            .await
            .unwrap();

        assert!(report.sent.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.contains("followup"));
        assert_eq!(automation.submissions().len(), before);
    }

    #[tokio::test]
    async fn test_concurrent_runs_send_once() {
        let (engine, automation, _) = test_engine().await;
        let t0 = Utc::now();
        let (campaign, contacts) = launched_campaign(&engine, &["jdoe"], t0).await;
        accept_all(&engine, campaign.id, &contacts, t0).await;
        let before = automation.submissions().len();

        let now = t0 + Duration::hours(25);
        let (cancel_a, cancel_b) = (CancelToken::new(), CancelToken::new());
        let (a, b) = tokio::join!(
            engine.run_followups(now, &cancel_a),
            engine.run_followups(now, &cancel_b),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.sent.len() + b.sent.len(), 1);
        assert_eq!(automation.submissions().len(), before + 1);
        assert_eq!(engine.get_contact(contacts[0].id).await.unwrap().followup_attempts, 1);
    }
}
