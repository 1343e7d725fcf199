// src/lifecycle/test_support.rs
//
// Fixtures and in-memory gateways for engine tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::ai::{DynMessageGenerator, GenerationError, MessageGenerator};
use crate::automation::{
    ActionKind, ActionResult, AutomationGateway, DynAutomationGateway, GatewayError, Submission,
};
use crate::db::create_memory_pool;
use crate::db::models::{
    Campaign, CampaignStatus, Contact, ContactFilter, ContactStatus, NewCampaign, NewContact,
    Variant,
};
use crate::lifecycle::templates::render_template;
use crate::lifecycle::{CancelToken, Engine, EngineConfig};

pub fn sample_contact() -> Contact {
    let now = Utc::now();
    Contact {
        id: Uuid::new_v4(),
        campaign_id: Uuid::new_v4(),
        linkedin_url: "https://www.linkedin.com/in/jdoe".into(),
        first_name: "John".into(),
        last_name: Some("Doe".into()),
        company: Some("Acme".into()),
        job_title: Some("Engineer".into()),
        status: ContactStatus::Created,
        variant: Variant::Networking,
        external_id: None,
        followup_attempts: 0,
        connection_message: None,
        followup_message: None,
        last_reply: None,
        reply_analysis: None,
        reply_analyzed_at: None,
        last_contacted_at: None,
        last_followup_at: None,
        accepted_at: None,
        replied_at: None,
        created_at: now,
        updated_at: now,
        version: 0,
    }
}

pub fn sample_campaign() -> Campaign {
    let now = Utc::now();
    Campaign {
        id: Uuid::new_v4(),
        name: "Sample".into(),
        description: String::new(),
        variant: Variant::Networking,
        spreadsheet_url: None,
        connection_template: None,
        status: CampaignStatus::Draft,
        created_at: now,
        updated_at: now,
    }
}

pub fn action_result(key: &str, outcome: &str) -> ActionResult {
    ActionResult {
        key: key.to_string(),
        profile_url: None,
        outcome: outcome.to_string(),
        reply_text: None,
        reported_at: Utc::now(),
    }
}

/// Records submissions; fails on demand.
#[derive(Default)]
pub struct FakeAutomation {
    submissions: Mutex<Vec<(Uuid, ActionKind, String)>>,
    results: Mutex<Vec<ActionResult>>,
    failing_contacts: Mutex<HashSet<Uuid>>,
    fail_all: AtomicBool,
    counter: AtomicUsize,
    cancel_on_submit: Mutex<Option<CancelToken>>,
}

impl FakeAutomation {
    pub fn submissions(&self) -> Vec<(Uuid, ActionKind, String)> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn set_results(&self, results: Vec<ActionResult>) {
        *self.results.lock().unwrap() = results;
    }

    pub fn fail_for(&self, contact_id: Uuid) {
        self.failing_contacts.lock().unwrap().insert(contact_id);
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Cancel `token` as soon as one submission goes through.
    pub fn cancel_after_submit(&self, token: CancelToken) {
        *self.cancel_on_submit.lock().unwrap() = Some(token);
    }
}

#[async_trait]
impl AutomationGateway for FakeAutomation {
    async fn submit(
        &self,
        contact: &Contact,
        kind: ActionKind,
        message: &str,
    ) -> Result<Submission, GatewayError> {
        if self.fail_all.load(Ordering::SeqCst)
            || self.failing_contacts.lock().unwrap().contains(&contact.id)
        {
            return Err(GatewayError::RateLimited);
        }

        self.submissions
            .lock()
            .unwrap()
            .push((contact.id, kind, message.to_string()));
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(token) = self.cancel_on_submit.lock().unwrap().as_ref() {
            token.cancel();
        }

        Ok(Submission {
            external_id: format!("ext-{n}"),
            submitted_at: Utc::now(),
        })
    }

    async fn fetch_results(&self, _campaign_handle: &str) -> Result<Vec<ActionResult>, GatewayError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(GatewayError::Network("unreachable".into()));
        }
        Ok(self.results.lock().unwrap().clone())
    }
}

/// Prefixes the rendered template with "AI: " unless told to fail.
/// Reply analyses come back as "AI analysis of: <reply>".
#[derive(Default)]
pub struct FakeGenerator {
    failing: AtomicBool,
}

impl FakeGenerator {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageGenerator for FakeGenerator {
    async fn generate(&self, contact: &Contact, template: &str) -> Result<String, GenerationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GenerationError::Network("model unavailable".into()));
        }
        Ok(format!("AI: {}", render_template(template, contact)))
    }

    async fn analyze_reply(&self, _contact: &Contact, reply: &str) -> Result<String, GenerationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GenerationError::Network("model unavailable".into()));
        }
        Ok(format!("AI analysis of: {reply}"))
    }
}

pub async fn test_engine_with(
    config: EngineConfig,
) -> (Engine, Arc<FakeAutomation>, Arc<FakeGenerator>) {
    let pool = create_memory_pool().await.unwrap();
    let automation = Arc::new(FakeAutomation::default());
    let generator = Arc::new(FakeGenerator::default());

    let engine = Engine::new(
        pool,
        automation.clone() as DynAutomationGateway,
        generator.clone() as DynMessageGenerator,
        config,
    );
    (engine, automation, generator)
}

pub async fn test_engine() -> (Engine, Arc<FakeAutomation>, Arc<FakeGenerator>) {
    test_engine_with(EngineConfig::default()).await
}

/// Draft campaign with one John Doe at Acme per profile slug.
pub async fn campaign_with_contacts(
    engine: &Engine,
    slugs: &[&str],
    now: DateTime<Utc>,
) -> (Campaign, Vec<Contact>) {
    let campaign = engine
        .create_campaign(
            NewCampaign {
                name: "Test campaign".into(),
                ..Default::default()
            },
            now,
        )
        .await
        .unwrap();

    let rows = slugs
        .iter()
        .map(|slug| NewContact {
            linkedin_url: format!("https://www.linkedin.com/in/{slug}"),
            first_name: "John".into(),
            last_name: Some("Doe".into()),
            company: Some("Acme".into()),
            job_title: Some("Engineer".into()),
            variant: None,
        })
        .collect();
    engine.add_contacts(campaign.id, rows, now).await.unwrap();

    let contacts = engine
        .list_contacts(&ContactFilter {
            campaign_id: Some(campaign.id),
            ..Default::default()
        })
        .await
        .unwrap();
    (campaign, contacts)
}

/// Campaign whose contacts have all been invited at `now`.
pub async fn launched_campaign(
    engine: &Engine,
    slugs: &[&str],
    now: DateTime<Utc>,
) -> (Campaign, Vec<Contact>) {
    let (campaign, _) = campaign_with_contacts(engine, slugs, now).await;
    engine
        .launch_campaign(campaign.id, now, &CancelToken::new())
        .await
        .unwrap();

    let campaign = engine.get_campaign(campaign.id).await.unwrap();
    let contacts = engine
        .list_contacts(&ContactFilter {
            campaign_id: Some(campaign.id),
            ..Default::default()
        })
        .await
        .unwrap();
    (campaign, contacts)
}
