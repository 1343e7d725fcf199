use chrono::{Duration, TimeZone, Utc};
use outreach_backend::db::models::{Contact, ContactStatus, Variant};
use outreach_backend::lifecycle::eligibility::{is_followup_eligible, FOLLOWUP_STATUSES};
use outreach_backend::lifecycle::sync::map_outcome;
use outreach_backend::lifecycle::transitions::{apply_status, can_transition};
use outreach_backend::lifecycle::EngineConfig;
use proptest::prelude::*;
use uuid::Uuid;

fn invited_contact() -> Contact {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    Contact {
        id: Uuid::new_v4(),
        campaign_id: Uuid::new_v4(),
        linkedin_url: "https://www.linkedin.com/in/prop".into(),
        first_name: "Pat".into(),
        last_name: None,
        company: Some("Acme".into()),
        job_title: None,
        status: ContactStatus::InvitationSent,
        variant: Variant::Networking,
        external_id: Some("ext-1".into()),
        followup_attempts: 0,
        connection_message: Some("hello".into()),
        followup_message: None,
        last_reply: None,
        reply_analysis: None,
        reply_analyzed_at: None,
        last_contacted_at: Some(t0),
        last_followup_at: None,
        accepted_at: None,
        replied_at: None,
        created_at: t0,
        updated_at: t0,
        version: 1,
    }
}

fn any_status() -> impl Strategy<Value = ContactStatus> {
    prop::sample::select(ContactStatus::ALL.to_vec())
}

fn any_report() -> impl Strategy<Value = (ContactStatus, Option<String>)> {
    (any_status(), prop::option::of("[a-z ]{0,12}"))
}

proptest! {
    #[test]
    fn test_random_reports_only_follow_legal_edges(reports in prop::collection::vec(any_report(), 0..20)) {
        let mut contact = invited_contact();
        let mut at = contact.created_at;

        for (target, reply) in reports {
            at += Duration::minutes(5);
            let before = contact.clone();

            match apply_status(&contact, target, reply.as_deref(), at) {
                Ok(Some(next)) => {
                    if next.status != before.status {
                        prop_assert!(can_transition(before.status, next.status));
                        prop_assert!(!before.status.is_terminal());
                    }
                    // Timestamps are set once and then left alone.
                    if before.accepted_at.is_some() {
                        prop_assert_eq!(next.accepted_at, before.accepted_at);
                    }
                    if before.replied_at.is_some() {
                        prop_assert_eq!(next.replied_at, before.replied_at);
                    }
                    contact = next;
                }
                Ok(None) => prop_assert_eq!(target, before.status),
                Err(_) => prop_assert!(!can_transition(before.status, target)),
            }

            if contact.status.is_replied() {
                prop_assert!(contact.accepted_at.is_some());
                prop_assert!(contact.replied_at.is_some());
            }
            // Sync never touches outreach bookkeeping.
            prop_assert_eq!(contact.followup_attempts, 0);
            prop_assert_eq!(&contact.external_id, &before.external_id);
        }
    }

    #[test]
    fn test_same_report_twice_is_a_no_op(target in any_status(), reply in prop::option::of("[a-z]{1,8}")) {
        let contact = invited_contact();
        let at = contact.created_at + Duration::hours(1);

        if let Ok(Some(once)) = apply_status(&contact, target, reply.as_deref(), at) {
            let twice = apply_status(&once, target, reply.as_deref(), at + Duration::hours(1));
            prop_assert!(matches!(twice, Ok(None)));
        }
    }

    #[test]
    fn test_outcome_mapping_ignores_case_and_separators(
        status in any_status().prop_filter("created is never reported", |s| *s != ContactStatus::Created),
        upper in any::<bool>(),
        separator in prop::sample::select(vec!["_", " ", "-", "  "]),
    ) {
        let mut raw = status.as_str().replace('_', separator);
        if upper {
            raw = raw.to_uppercase();
        }
        prop_assert_eq!(map_outcome(&raw), Some(status));
    }

    #[test]
    fn test_eligibility_respects_cap_and_status(
        status in any_status(),
        attempts in 0i32..6,
        hours_since in 0i64..100,
    ) {
        let config = EngineConfig::default();
        let mut contact = invited_contact();
        contact.status = status;
        contact.followup_attempts = attempts;
        let now = contact.last_contacted_at.unwrap() + Duration::hours(hours_since);
        if attempts > 0 {
            contact.last_followup_at = contact.last_contacted_at;
        }

        let eligible = is_followup_eligible(&contact, &config, now);
        let expected = FOLLOWUP_STATUSES.contains(&status)
            && attempts < config.max_followup_attempts
            && hours_since >= 24;
        prop_assert_eq!(eligible, expected);
    }
}
