// src/ai/mod.rs

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::models::Contact;
use crate::lifecycle::templates::render_template;

pub mod deepseek;

pub use deepseek::DeepSeekClient;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("network error: {0}")]
    Network(String),

    #[error("LLM API returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("unexpected LLM response format: {0}")]
    Decode(String),

    #[error("LLM returned an empty message")]
    EmptyResponse,
}

/// Dynamic message generator trait object.
pub type DynMessageGenerator = Arc<dyn MessageGenerator>;

/// Abstraction for whatever writes the final outreach text.
#[async_trait]
pub trait MessageGenerator: Send + Sync {
    /// Produce a personalized message for `contact`, using `template` as the
    /// starting point (placeholders may still be present).
    async fn generate(&self, contact: &Contact, template: &str) -> Result<String, GenerationError>;

    /// Assess a reply: sentiment, interest level, response type and the
    /// recommended next action, as short labelled lines.
    async fn analyze_reply(&self, contact: &Contact, reply: &str) -> Result<String, GenerationError>;
}

/// Fills placeholders and nothing else.
pub struct TemplateGenerator;

#[async_trait]
impl MessageGenerator for TemplateGenerator {
    async fn generate(&self, contact: &Contact, template: &str) -> Result<String, GenerationError> {
        Ok(render_template(template, contact))
    }

    async fn analyze_reply(&self, _contact: &Contact, reply: &str) -> Result<String, GenerationError> {
        Ok(summarize_reply(reply))
    }
}

/// Keyword-based reply assessment, used without an LLM or when it fails.
pub fn summarize_reply(reply: &str) -> String {
    let text = reply.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| text.contains(w));

    let negative = mentions(&[
        "not interested",
        "no thanks",
        "no thank you",
        "unsubscribe",
        "stop messaging",
        "remove me",
    ]);
    let positive = !negative
        && mentions(&[
            "thank", "sure", "happy", "glad", "interested", "love to", "sounds good", "yes",
            "let's", "great",
        ]);
    let wants_info = !negative && mentions(&["send", "more info", "details", "information", "deck"]);
    let question = text.contains('?');

    let sentiment = if negative {
        "negative"
    } else if positive {
        "positive"
    } else {
        "neutral"
    };
    let interest = match (negative, positive, question || wants_info) {
        (true, _, _) => "low",
        (false, true, _) => "high",
        (false, false, true) => "medium",
        _ => "low",
    };
    let (response_type, next_action) = if negative {
        ("decline", "no action needed")
    } else if wants_info {
        ("request for info", "send info")
    } else if question {
        ("question", "follow up")
    } else if positive {
        ("acceptance", "schedule call")
    } else {
        ("acceptance", "follow up")
    };

    format!(
        "Sentiment: {sentiment}\nInterest level: {interest}\nResponse type: {response_type}\nRecommended next action: {next_action}"
    )
}

/// Factory function to build a message generator from config.
///
/// - LLM_PROVIDER=template → TemplateGenerator
/// - LLM_PROVIDER=deepseek, or unset with DEEPSEEK_API_KEY present → DeepSeekClient
/// - anything else → TemplateGenerator
pub fn build_llm_client(cfg: &Config) -> Result<DynMessageGenerator, GenerationError> {
    let provider = cfg
        .llm_provider
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_else(|| {
            if cfg.deepseek_api_key.is_some() {
                "deepseek".to_string()
            } else {
                "template".to_string()
            }
        });

    match (provider.as_str(), &cfg.deepseek_api_key) {
        ("deepseek", Some(api_key)) => {
            info!(
                "Initializing DeepSeekClient (model={}, url={})",
                cfg.deepseek_model, cfg.deepseek_api_url
            );
            let client = DeepSeekClient::new(
                cfg.deepseek_api_url.clone(),
                api_key.clone(),
                cfg.deepseek_model.clone(),
                std::time::Duration::from_secs(cfg.gateway_timeout_secs),
            )?;
            Ok(Arc::new(client) as DynMessageGenerator)
        }
        ("deepseek", None) => {
            warn!("LLM_PROVIDER=deepseek but DEEPSEEK_API_KEY is not set; using TemplateGenerator");
            Ok(Arc::new(TemplateGenerator) as DynMessageGenerator)
        }
        ("template", _) => {
            info!("Using TemplateGenerator (placeholder substitution only)");
            Ok(Arc::new(TemplateGenerator) as DynMessageGenerator)
        }
        (other, _) => {
            warn!("Unknown LLM_PROVIDER '{}'; using TemplateGenerator", other);
            Ok(Arc::new(TemplateGenerator) as DynMessageGenerator)
        }
    }
}
