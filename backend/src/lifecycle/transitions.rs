// src/lifecycle/transitions.rs
//
// Contact status state machine.
//
//   created -> invitation_sent
//   invitation_sent -> invitation_accepted | replied_connection_request
//                      | connection_declined* | no_response
//   invitation_accepted -> replied_connection_request | replied_followup* | no_response
//   replied_connection_request -> replied_followup* | no_response
//   no_response -> replied_connection_request | replied_followup*
//
// Every function here is pure: it takes a contact snapshot and returns the
// next snapshot. Persisting it is the caller's job.

use chrono::{DateTime, Utc};

use crate::automation::Submission;
use crate::db::models::{Contact, ContactStatus};
use crate::error::{EngineError, EngineResult};

/// Whether `from -> to` is an edge of the state machine.
/// Same-state pairs are not edges; callers treat them as no-ops.
pub fn can_transition(from: ContactStatus, to: ContactStatus) -> bool {
    use ContactStatus::*;
    matches!(
        (from, to),
        (Created, InvitationSent)
            | (InvitationSent, InvitationAccepted)
            | (InvitationSent, RepliedConnectionRequest)
            | (InvitationSent, ConnectionDeclined)
            | (InvitationSent, NoResponse)
            | (InvitationAccepted, RepliedConnectionRequest)
            | (InvitationAccepted, RepliedFollowup)
            | (InvitationAccepted, NoResponse)
            | (RepliedConnectionRequest, RepliedFollowup)
            | (RepliedConnectionRequest, NoResponse)
            | (NoResponse, RepliedConnectionRequest)
            | (NoResponse, RepliedFollowup)
    )
}

/// Whether `to` can be reached from `from` in one or more steps.
pub fn is_reachable(from: ContactStatus, to: ContactStatus) -> bool {
    let mut seen = vec![from];
    let mut frontier = vec![from];
    while let Some(status) = frontier.pop() {
        for next in ContactStatus::ALL {
            if can_transition(status, next) && !seen.contains(&next) {
                if next == to {
                    return true;
                }
                seen.push(next);
                frontier.push(next);
            }
        }
    }
    false
}

/// A report of an earlier milestone (sent, accepted) for a contact that has
/// already moved past it. Connection agents keep reporting these long after
/// the contact progressed.
pub fn is_outdated_report(current: ContactStatus, reported: ContactStatus) -> bool {
    matches!(
        reported,
        ContactStatus::InvitationSent | ContactStatus::InvitationAccepted
    ) && is_reachable(reported, current)
}

pub fn check_transition(from: ContactStatus, to: ContactStatus) -> EngineResult<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(EngineError::IllegalTransition { from, to })
    }
}

/// Fold a reported status (and optional reply text) into a contact.
///
/// Returns `Ok(None)` when the contact already reflects the report, so
/// applying the same report twice never touches the row a second time.
pub fn apply_status(
    contact: &Contact,
    target: ContactStatus,
    reply: Option<&str>,
    at: DateTime<Utc>,
) -> EngineResult<Option<Contact>> {
    let reply = reply.map(str::trim).filter(|r| !r.is_empty());
    let reply_changed = reply.is_some() && reply != contact.last_reply.as_deref();

    if target == contact.status {
        if !reply_changed {
            return Ok(None);
        }
        let mut next = contact.clone();
        set_reply(&mut next, reply);
        next.updated_at = at;
        return Ok(Some(next));
    }

    check_transition(contact.status, target)?;

    let mut next = contact.clone();
    next.status = target;

    if target == ContactStatus::InvitationAccepted || target.is_replied() {
        // A reply implies the invitation was accepted at some point.
        next.accepted_at.get_or_insert(at);
    }
    if target.is_replied() {
        next.replied_at.get_or_insert(at);
    }
    if reply_changed {
        set_reply(&mut next, reply);
    }
    next.updated_at = at;

    Ok(Some(next))
}

/// A new reply invalidates any analysis of the previous one.
fn set_reply(contact: &mut Contact, reply: Option<&str>) {
    contact.last_reply = reply.map(str::to_string);
    contact.reply_analysis = None;
    contact.reply_analyzed_at = None;
}

/// The analysis of the contact's current reply is in.
pub fn record_reply_analysis(contact: &Contact, analysis: &str, now: DateTime<Utc>) -> Contact {
    let mut next = contact.clone();
    next.reply_analysis = Some(analysis.to_string());
    next.reply_analyzed_at = Some(now);
    next.updated_at = now;
    next
}

/// The connection request went out.
pub fn mark_invitation_sent(
    contact: &Contact,
    submission: &Submission,
    message: &str,
    now: DateTime<Utc>,
) -> EngineResult<Contact> {
    check_transition(contact.status, ContactStatus::InvitationSent)?;

    let mut next = contact.clone();
    next.status = ContactStatus::InvitationSent;
    next.external_id = Some(submission.external_id.clone());
    next.connection_message = Some(message.to_string());
    next.last_contacted_at = Some(now);
    next.updated_at = now;
    Ok(next)
}

/// A follow-up went out. Status is left alone; the outcome arrives via sync.
pub fn record_followup(
    contact: &Contact,
    submission: &Submission,
    message: &str,
    now: DateTime<Utc>,
) -> Contact {
    let mut next = contact.clone();
    next.followup_attempts += 1;
    next.external_id = Some(submission.external_id.clone());
    next.followup_message = Some(message.to_string());
    next.last_followup_at = Some(now);
    next.updated_at = now;
    next
}
