// src/lifecycle/replies.rs
//
// Reply analysis: ask the generator what a contact's reply means and keep
// the answer on the contact row.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::ai::summarize_reply;
use crate::db::contacts as contact_db;
use crate::db::models::Contact;
use crate::error::{EngineError, EngineResult};
use crate::lifecycle::{transitions, CancelToken, ContactFailure, Engine};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplyAnalysisReport {
    pub analyzed: Vec<Uuid>,
    /// Analyses produced by keyword matching because the generator failed.
    pub fallbacks: usize,
    pub failures: Vec<ContactFailure>,
    pub aborted: bool,
}

impl Engine {
    /// Analyze the contact's latest reply and store the result.
    ///
    /// A generator failure falls back to keyword matching, so this only
    /// fails for unknown contacts, contacts without a reply, or storage.
    pub async fn analyze_reply(&self, contact_id: Uuid, now: DateTime<Utc>) -> EngineResult<Contact> {
        let (contact, _) = self.analyze_one(contact_id, now).await?;
        Ok(contact)
    }

    /// Analyze every stored reply that has no analysis yet.
    pub async fn analyze_pending_replies(
        &self,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> EngineResult<ReplyAnalysisReport> {
        let pending = contact_db::list_unanalyzed_replies(&self.pool).await?;
        let mut report = ReplyAnalysisReport::default();

        for contact in pending {
            if cancel.is_cancelled() {
                warn!("Reply analysis cancelled");
                report.aborted = true;
                break;
            }

            match self.analyze_one(contact.id, now).await {
                Ok((analyzed, fell_back)) => {
                    report.analyzed.push(analyzed.id);
                    if fell_back {
                        report.fallbacks += 1;
                    }
                }
                Err(err) if err.is_fatal() => {
                    error!("Reply analysis stopped: {}", err);
                    self.locks.prune();
                    return Err(err);
                }
                Err(err) => {
                    warn!("Could not analyze reply of contact {}: {}", contact.id, err);
                    report.failures.push(ContactFailure::new(contact.id, &err));
                }
            }
        }

        self.locks.prune();
        if !report.analyzed.is_empty() {
            info!(
                "Analyzed {} replies ({} by keyword fallback)",
                report.analyzed.len(),
                report.fallbacks
            );
        }
        Ok(report)
    }

    async fn analyze_one(&self, contact_id: Uuid, now: DateTime<Utc>) -> EngineResult<(Contact, bool)> {
        let _guard = self.locks.acquire(contact_id).await;

        let contact = self.get_contact(contact_id).await?;
        let Some(reply) = contact.last_reply.clone() else {
            return Err(EngineError::Validation(format!(
                "contact {contact_id} has no reply to analyze"
            )));
        };

        let (analysis, fell_back) = match self.generator.analyze_reply(&contact, &reply).await {
            Ok(analysis) => (analysis, false),
            Err(err) => {
                warn!(
                    "Reply analysis failed for contact {}, using keyword fallback: {}",
                    contact.id, err
                );
                (summarize_reply(&reply), true)
            }
        };

        let next = transitions::record_reply_analysis(&contact, &analysis, now);
        self.commit(&next).await?;

        let mut stored = next;
        stored.version += 1;
        Ok((stored, fell_back))
    }
}
