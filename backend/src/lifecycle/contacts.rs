// src/lifecycle/contacts.rs
//
// Contact creation: validation, URL normalisation, spreadsheet import.

use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::contacts as contact_db;
use crate::db::models::NewContact;
use crate::error::EngineResult;
use crate::import::{self, ImportError, ParsedRow};
use crate::lifecycle::{Engine, ImportReport, InvalidRow};

/// Canonical form of a LinkedIn profile URL.
///
/// Adds a missing scheme, lowercases the host, drops query, fragment and
/// trailing slash. Non-LinkedIn URLs are rejected.
pub fn normalize_linkedin_url(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("linkedin_url is required".to_string());
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let mut url = Url::parse(&candidate).map_err(|e| format!("invalid linkedin_url '{trimmed}': {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("linkedin_url must be http(s): '{trimmed}'"));
    }

    let host = url.host_str().unwrap_or_default();
    if host != "linkedin.com" && !host.ends_with(".linkedin.com") {
        return Err(format!("not a LinkedIn URL: '{trimmed}'"));
    }

    url.set_query(None);
    url.set_fragment(None);

    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Check a row and return it in canonical form.
pub fn validate_new_contact(new: &NewContact) -> Result<NewContact, String> {
    let linkedin_url = normalize_linkedin_url(&new.linkedin_url)?;

    let first_name = new.first_name.trim();
    if first_name.is_empty() {
        return Err("first_name is required".to_string());
    }

    let clean = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Ok(NewContact {
        linkedin_url,
        first_name: first_name.to_string(),
        last_name: clean(&new.last_name),
        company: clean(&new.company),
        job_title: clean(&new.job_title),
        variant: new.variant,
    })
}

impl Engine {
    /// Add contacts to a campaign in `created` status.
    ///
    /// Invalid rows and URLs already in the campaign are reported, not fatal.
    pub async fn add_contacts(
        &self,
        campaign_id: Uuid,
        contacts: Vec<NewContact>,
        now: DateTime<Utc>,
    ) -> EngineResult<ImportReport> {
        let rows = contacts
            .into_iter()
            .enumerate()
            .map(|(idx, contact)| ParsedRow {
                line: idx + 1,
                contact: Ok(contact),
            })
            .collect();
        self.add_rows(campaign_id, rows, now).await
    }

    /// Import contacts from CSV text (header row required).
    pub async fn import_csv(
        &self,
        campaign_id: Uuid,
        csv: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<ImportReport> {
        // Fail on an unknown campaign before looking at the file.
        self.get_campaign(campaign_id).await?;
        let rows = import::parse_contacts_csv(csv.as_bytes())?;
        self.add_rows(campaign_id, rows, now).await
    }

    /// Download the campaign's spreadsheet and import it.
    pub async fn import_spreadsheet(
        &self,
        campaign_id: Uuid,
        http: &Client,
        now: DateTime<Utc>,
    ) -> EngineResult<ImportReport> {
        let campaign = self.get_campaign(campaign_id).await?;
        let url = campaign
            .spreadsheet_url
            .as_deref()
            .ok_or(ImportError::NoSpreadsheet)?;

        let csv = import::fetch_spreadsheet(http, url).await?;
        self.import_csv(campaign_id, &csv, now).await
    }

    async fn add_rows(
        &self,
        campaign_id: Uuid,
        rows: Vec<ParsedRow>,
        now: DateTime<Utc>,
    ) -> EngineResult<ImportReport> {
        let campaign = self.get_campaign(campaign_id).await?;
        let mut report = ImportReport::default();

        for row in rows {
            let validated = row.contact.and_then(|c| validate_new_contact(&c));
            let contact = match validated {
                Ok(contact) => contact,
                Err(reason) => {
                    warn!("Skipping row {} for campaign {}: {}", row.line, campaign_id, reason);
                    report.invalid.push(InvalidRow { row: row.line, reason });
                    continue;
                }
            };

            let variant = contact.variant.unwrap_or(campaign.variant);
            match contact_db::insert_contact(&self.pool, campaign_id, &contact, variant, now).await? {
                Some(created) => report.created.push(created.id),
                None => report.duplicates.push(contact.linkedin_url),
            }
        }

        info!(
            "Campaign {}: {} contacts created, {} duplicates, {} invalid",
            campaign_id,
            report.created.len(),
            report.duplicates.len(),
            report.invalid.len()
        );
        Ok(report)
    }
}
