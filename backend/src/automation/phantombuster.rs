// src/automation/phantombuster.rs
//
// PhantomBuster REST client.
//
// API:
// - Launch agent: POST {base}/agents/launch  { id, argument: {...} } -> { containerId }
// - Fetch agent:  GET  {base}/agents/fetch?id={agent}  -> { data: [ {...}, ... ] }
//
// Result entries (wire format):
//   { "linkedinUrl": "...", "status": "Invitation accepted", "replyText": "...",
//     "timestamp": "2024-05-01T10:00:00Z", "campaignId": "..." }

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::automation::{ActionKind, ActionResult, AutomationGateway, GatewayError, Submission};
use crate::db::models::Contact;

const API_KEY_HEADER: &str = "X-Phantombuster-Key-1";

#[derive(Clone)]
pub struct PhantomBusterClient {
    http: Client,
    api_base: String,
    api_key: String,
    connection_agent_id: String,
    followup_agent_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LaunchResponse {
    container_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    #[serde(default)]
    data: Vec<RawResultEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResultEntry {
    #[serde(default)]
    linkedin_url: Option<String>,
    #[serde(default)]
    container_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    reply_text: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    campaign_id: Option<String>,
}

impl PhantomBusterClient {
    pub fn new(
        api_base: String,
        api_key: String,
        connection_agent_id: String,
        followup_agent_id: String,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            connection_agent_id,
            followup_agent_id,
        })
    }

    fn agent_for(&self, kind: ActionKind) -> &str {
        match kind {
            ActionKind::Connection => &self.connection_agent_id,
            ActionKind::Followup => &self.followup_agent_id,
        }
    }
}

/// Map non-success statuses onto the gateway taxonomy.
async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GatewayError::Auth),
        StatusCode::TOO_MANY_REQUESTS => Err(GatewayError::RateLimited),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            })
        }
    }
}

fn network_error(err: reqwest::Error) -> GatewayError {
    GatewayError::Network(err.to_string())
}

#[async_trait]
impl AutomationGateway for PhantomBusterClient {
    async fn submit(
        &self,
        contact: &Contact,
        kind: ActionKind,
        message: &str,
    ) -> Result<Submission, GatewayError> {
        let url = format!("{}/agents/launch", self.api_base);
        let body = json!({
            "id": self.agent_for(kind),
            "argument": {
                "profileUrl": contact.linkedin_url,
                "message": message,
                "campaignId": contact.campaign_id.to_string(),
                "contactId": contact.id.to_string(),
                "actionType": kind,
            }
        });

        info!(
            "Submitting {:?} action for contact {} ({})",
            kind, contact.id, contact.linkedin_url
        );

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let response = check_status(response).await?;
        let launched: LaunchResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        let external_id = launched
            .container_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| GatewayError::Decode("launch response without containerId".to_string()))?;

        Ok(Submission {
            external_id,
            submitted_at: Utc::now(),
        })
    }

    async fn fetch_results(&self, campaign_handle: &str) -> Result<Vec<ActionResult>, GatewayError> {
        let url = format!("{}/agents/fetch", self.api_base);
        let mut results = Vec::new();

        let mut agents = vec![self.connection_agent_id.as_str()];
        if self.followup_agent_id != self.connection_agent_id {
            agents.push(self.followup_agent_id.as_str());
        }

        for agent_id in agents {
            let response = self
                .http
                .get(&url)
                .query(&[("id", agent_id)])
                .header(API_KEY_HEADER, &self.api_key)
                .send()
                .await
                .map_err(network_error)?;

            let response = check_status(response).await?;
            let fetched: FetchResponse = response
                .json()
                .await
                .map_err(|e| GatewayError::Decode(e.to_string()))?;

            let before = results.len();
            results.extend(
                fetched
                    .data
                    .into_iter()
                    .filter(|entry| belongs_to_campaign(entry, campaign_handle))
                    .filter_map(RawResultEntry::into_action_result),
            );
            debug!(
                "Fetched {} results from agent {} for campaign {}",
                results.len() - before,
                agent_id,
                campaign_handle
            );
        }

        Ok(results)
    }
}

/// Entries without a campaign tag are kept; the engine reports the ones it
/// cannot match.
fn belongs_to_campaign(entry: &RawResultEntry, campaign_handle: &str) -> bool {
    match entry.campaign_id.as_deref() {
        Some(tag) if !tag.is_empty() => tag == campaign_handle,
        _ => true,
    }
}

impl RawResultEntry {
    fn into_action_result(self) -> Option<ActionResult> {
        let profile_url = self.linkedin_url.filter(|u| !u.is_empty());
        let key = self
            .container_id
            .filter(|k| !k.is_empty())
            .or_else(|| profile_url.clone());

        let Some(key) = key else {
            warn!("Dropping PhantomBuster result entry without profile URL or container id");
            return None;
        };

        Some(ActionResult {
            key,
            profile_url,
            outcome: self.status.unwrap_or_default(),
            reply_text: self.reply_text.filter(|t| !t.trim().is_empty()),
            reported_at: self
                .timestamp
                .as_deref()
                .and_then(parse_flexible_date)
                .unwrap_or_else(Utc::now),
        })
    }
}

/// Try to parse either "YYYY-MM-DD" or full RFC3339.
fn parse_flexible_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(json: serde_json::Value) -> RawResultEntry {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_parse_fetch_payload() {
        let payload = json!({
            "data": [
                {
                    "linkedinUrl": "https://www.linkedin.com/in/jdoe",
                    "status": "Invitation accepted",
                    "timestamp": "2024-05-01T10:00:00Z",
                    "campaignId": "c-1"
                },
                {
                    "linkedinUrl": "https://www.linkedin.com/in/asmith",
                    "status": "Replied (Connection request)",
                    "replyText": "Sure, happy to chat"
                }
            ]
        });

        let parsed: FetchResponse = serde_json::from_value(payload).unwrap();
        let results: Vec<ActionResult> = parsed
            .data
            .into_iter()
            .filter(|e| belongs_to_campaign(e, "c-1"))
            .filter_map(RawResultEntry::into_action_result)
            .collect();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].key, "https://www.linkedin.com/in/jdoe");
        assert_eq!(results[0].outcome, "Invitation accepted");
        assert_eq!(
            results[0].reported_at,
            DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap().with_timezone(&Utc)
        );
        assert_eq!(results[1].reply_text.as_deref(), Some("Sure, happy to chat"));
    }

    #[test]
    fn test_other_campaign_entries_are_filtered() {
        let other = entry(json!({ "linkedinUrl": "https://x", "campaignId": "c-2" }));
        let untagged = entry(json!({ "linkedinUrl": "https://y" }));

        assert!(!belongs_to_campaign(&other, "c-1"));
        assert!(belongs_to_campaign(&untagged, "c-1"));
    }

    #[test]
    fn test_container_id_is_preferred_key() {
        let result = entry(json!({
            "linkedinUrl": "https://www.linkedin.com/in/jdoe",
            "containerId": "42",
            "status": "accepted"
        }))
        .into_action_result()
        .unwrap();

        assert_eq!(result.key, "42");
        assert_eq!(result.profile_url.as_deref(), Some("https://www.linkedin.com/in/jdoe"));
    }

    #[test]
    fn test_entry_without_key_is_dropped() {
        assert!(entry(json!({ "status": "accepted" })).into_action_result().is_none());
    }

    #[test]
    fn test_parse_flexible_date() {
        assert!(parse_flexible_date("2024-03-01").is_some());
        assert!(parse_flexible_date("2024-03-01T12:30:00+02:00").is_some());
        assert!(parse_flexible_date("yesterday").is_none());
    }
}
