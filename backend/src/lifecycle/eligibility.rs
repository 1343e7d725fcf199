// src/lifecycle/eligibility.rs
//
// Follow-up eligibility policy. Recomputed on every scan from the stored
// contact rows; nothing here is cached.

use chrono::{DateTime, Utc};

use crate::db::models::{Contact, ContactStatus};
use crate::lifecycle::EngineConfig;

/// Statuses that may receive a follow-up.
pub const FOLLOWUP_STATUSES: [ContactStatus; 2] =
    [ContactStatus::InvitationAccepted, ContactStatus::NoResponse];

/// The moment the follow-up delay is measured from.
///
/// After the first follow-up this is `last_followup_at`; before it, the
/// connection submission. Rows missing those fall back to acceptance, then
/// creation.
pub fn reference_time(contact: &Contact) -> DateTime<Utc> {
    let last_followup = if contact.followup_attempts > 0 {
        contact.last_followup_at
    } else {
        None
    };

    last_followup
        .or(contact.last_contacted_at)
        .or(contact.accepted_at)
        .unwrap_or(contact.created_at)
}

pub fn is_followup_eligible(contact: &Contact, config: &EngineConfig, now: DateTime<Utc>) -> bool {
    FOLLOWUP_STATUSES.contains(&contact.status)
        && contact.followup_attempts < config.max_followup_attempts
        && now.signed_duration_since(reference_time(contact)) >= config.followup_delay
}

/// Filter candidates down to the eligible ones, oldest contact first.
pub fn select_eligible(
    candidates: Vec<Contact>,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Vec<Contact> {
    let mut eligible: Vec<Contact> = candidates
        .into_iter()
        .filter(|c| is_followup_eligible(c, config, now))
        .collect();
    // Stable: rows sharing a created_at keep their storage order.
    eligible.sort_by_key(|c| c.created_at);
    eligible
}
