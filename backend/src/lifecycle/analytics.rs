// src/lifecycle/analytics.rs

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use uuid::Uuid;

use crate::db::models::{Contact, ContactFilter, ContactStatus, Variant};
use crate::error::EngineResult;
use crate::lifecycle::Engine;

const TOP_COMPANIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantPerformance {
    pub variant: Variant,
    pub total: usize,
    pub accepted: usize,
    pub replied: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyCount {
    pub company: String,
    pub contacts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analytics {
    pub campaign_id: Option<Uuid>,
    pub total_contacts: usize,
    /// Every status is present, zero or not.
    pub status_counts: BTreeMap<String, usize>,
    pub sent: usize,
    pub accepted: usize,
    pub replied: usize,
    pub followups_sent: i64,
    /// accepted / sent
    pub connection_rate: f64,
    /// replied / accepted
    pub response_rate: f64,
    pub variants: Vec<VariantPerformance>,
    pub top_companies: Vec<CompanyCount>,
}

fn has_accepted(contact: &Contact) -> bool {
    contact.accepted_at.is_some()
        || contact.status == ContactStatus::InvitationAccepted
        || contact.status.is_replied()
}

fn has_replied(contact: &Contact) -> bool {
    contact.replied_at.is_some() || contact.status.is_replied()
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

pub fn summarize(campaign_id: Option<Uuid>, contacts: &[Contact]) -> Analytics {
    let mut status_counts: BTreeMap<String, usize> = ContactStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    for contact in contacts {
        *status_counts.entry(contact.status.as_str().to_string()).or_default() += 1;
    }

    let sent = contacts
        .iter()
        .filter(|c| c.status != ContactStatus::Created)
        .count();
    let accepted = contacts.iter().filter(|c| has_accepted(c)).count();
    let replied = contacts.iter().filter(|c| has_replied(c)).count();

    let variants = Variant::ALL
        .into_iter()
        .filter_map(|variant| {
            let group: Vec<&Contact> = contacts.iter().filter(|c| c.variant == variant).collect();
            if group.is_empty() {
                return None;
            }
            Some(VariantPerformance {
                variant,
                total: group.len(),
                accepted: group.iter().filter(|c| has_accepted(c)).count(),
                replied: group.iter().filter(|c| has_replied(c)).count(),
            })
        })
        .collect();

    let mut by_company: HashMap<&str, usize> = HashMap::new();
    for company in contacts
        .iter()
        .filter_map(|c| c.company.as_deref())
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        *by_company.entry(company).or_default() += 1;
    }
    let mut top_companies: Vec<CompanyCount> = by_company
        .into_iter()
        .map(|(company, contacts)| CompanyCount {
            company: company.to_string(),
            contacts,
        })
        .collect();
    top_companies.sort_by(|a, b| b.contacts.cmp(&a.contacts).then_with(|| a.company.cmp(&b.company)));
    top_companies.truncate(TOP_COMPANIES);

    Analytics {
        campaign_id,
        total_contacts: contacts.len(),
        status_counts,
        sent,
        accepted,
        replied,
        followups_sent: contacts.iter().map(|c| i64::from(c.followup_attempts)).sum(),
        connection_rate: ratio(accepted, sent),
        response_rate: ratio(replied, accepted),
        variants,
        top_companies,
    }
}

impl Engine {
    /// Aggregate counts and rates for one campaign, or for everything.
    pub async fn get_analytics(&self, campaign_id: Option<Uuid>) -> EngineResult<Analytics> {
        if let Some(id) = campaign_id {
            self.get_campaign(id).await?;
        }

        let contacts = self
            .list_contacts(&ContactFilter {
                campaign_id,
                ..Default::default()
            })
            .await?;

        Ok(summarize(campaign_id, &contacts))
    }
}
