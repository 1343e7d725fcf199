// src/automation/mod.rs
//
// Automation gateway: submits LinkedIn actions (connection requests and
// messages) to the browser-automation service and reads back their outcomes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::models::Contact;

pub mod phantombuster;

pub use phantombuster::PhantomBusterClient;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("authentication rejected by automation service")]
    Auth,

    #[error("rate limited by automation service")]
    RateLimited,

    #[error("network error: {0}")]
    Network(String),

    #[error("automation service returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("could not decode automation response: {0}")]
    Decode(String),

    #[error("automation gateway is not configured")]
    NotConfigured,
}

/// Which kind of LinkedIn action is being submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Connection,
    Followup,
}

/// Acknowledgement of a submitted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub external_id: String,
    pub submitted_at: DateTime<Utc>,
}

/// Outcome reported by the automation service for one contact.
///
/// `key` is either the handle returned by `submit` or the profile URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub key: String,
    /// Profile the result is about, when the service reports it.
    pub profile_url: Option<String>,
    pub outcome: String,
    pub reply_text: Option<String>,
    pub reported_at: DateTime<Utc>,
}

#[async_trait]
pub trait AutomationGateway: Send + Sync {
    /// Submit one action for one contact.
    async fn submit(
        &self,
        contact: &Contact,
        kind: ActionKind,
        message: &str,
    ) -> Result<Submission, GatewayError>;

    /// All outcomes currently known for a campaign.
    async fn fetch_results(&self, campaign_handle: &str) -> Result<Vec<ActionResult>, GatewayError>;
}

pub type DynAutomationGateway = Arc<dyn AutomationGateway>;

/// Used when no credentials are configured: every call fails, so contacts
/// are never marked as contacted without an actual submission.
#[derive(Clone, Default)]
pub struct DisabledAutomation;

#[async_trait]
impl AutomationGateway for DisabledAutomation {
    async fn submit(
        &self,
        _contact: &Contact,
        _kind: ActionKind,
        _message: &str,
    ) -> Result<Submission, GatewayError> {
        Err(GatewayError::NotConfigured)
    }

    async fn fetch_results(&self, _campaign_handle: &str) -> Result<Vec<ActionResult>, GatewayError> {
        Err(GatewayError::NotConfigured)
    }
}

/// Build the automation gateway from config.
///
/// PHANTOMBUSTER_API_KEY and PHANTOM_ID set -> PhantomBuster client
/// Otherwise -> disabled gateway
pub fn build_automation_client(cfg: &Config) -> Result<DynAutomationGateway, GatewayError> {
    match (&cfg.phantombuster_api_key, &cfg.phantom_id) {
        (Some(api_key), Some(phantom_id)) => {
            info!(
                "Initializing PhantomBusterClient (base={}, phantom_id={})",
                cfg.phantombuster_api_base, phantom_id
            );
            let client = PhantomBusterClient::new(
                cfg.phantombuster_api_base.clone(),
                api_key.clone(),
                phantom_id.clone(),
                cfg.followup_phantom_id.clone().unwrap_or_else(|| phantom_id.clone()),
                std::time::Duration::from_secs(cfg.gateway_timeout_secs),
            )?;
            Ok(Arc::new(client) as DynAutomationGateway)
        }
        _ => {
            warn!("PHANTOMBUSTER_API_KEY or PHANTOM_ID not set; automation gateway disabled");
            Ok(Arc::new(DisabledAutomation) as DynAutomationGateway)
        }
    }
}
