// src/ai/deepseek.rs
//
// DeepSeek chat-completions client used to personalize outreach messages
// and assess replies.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::ai::{GenerationError, MessageGenerator};
use crate::db::models::Contact;

const SYSTEM_PROMPT: &str = "You are a professional LinkedIn outreach assistant. Write concise, \
    personalized messages that are professional, friendly, and include a specific call to action.";

const ANALYST_PROMPT: &str = "You are a professional communication analyst. Analyze LinkedIn \
    messages to determine sentiment, interest level, and recommend next actions.";

#[derive(Clone)]
pub struct DeepSeekClient {
    http: Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

impl DeepSeekClient {
    pub fn new(
        api_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_url,
            api_key,
            model,
        })
    }
}

/// Build the user prompt for one contact.
pub fn build_prompt(contact: &Contact, template: &str) -> String {
    let job_title = contact.job_title.as_deref().unwrap_or("professional");
    let company = contact.company.as_deref().unwrap_or("their company");

    format!(
        "Write a personalized, professional LinkedIn message to {name}, a {job_title} at {company}.\n\
         Context: this outreach is about {context}.\n\
         Base it on this template, keeping its intent and replacing any placeholders:\n\
         \"{template}\"\n\
         Requirements:\n\
         - Keep it under 150 words\n\
         - Be professional but friendly, not pushy or salesy\n\
         - Reference their role and company naturally\n\
         - End with a specific question or call to action\n\
         Return plain text only, without markdown.",
        name = contact.full_name(),
        context = contact.variant.context(),
    )
}

/// Build the user prompt asking for an assessment of `reply`.
pub fn build_analysis_prompt(contact: &Contact, reply: &str) -> String {
    let job_title = contact.job_title.as_deref().unwrap_or("professional");
    let company = contact.company.as_deref().unwrap_or("their company");

    format!(
        "Analyze this LinkedIn reply from {name} ({job_title} at {company}):\n\
         \"{reply}\"\n\
         Answer with exactly these labelled lines:\n\
         Sentiment: positive, neutral or negative\n\
         Interest level: high, medium or low\n\
         Response type: acceptance, question, decline or request for info\n\
         Recommended next action: follow up, schedule call, send info or no action needed\n\
         Key topics: a short comma-separated list",
        name = contact.full_name(),
    )
}

/// Pull the first non-empty message out of a chat-completions payload.
fn extract_message(response: ChatResponse) -> Result<String, GenerationError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::Decode("no choices in response".to_string()))?;

    let text = choice.message.content.trim().to_string();
    if text.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(text)
}

impl DeepSeekClient {
    /// One chat-completions round trip; returns the first message's text.
    async fn complete(
        &self,
        system: &str,
        user: String,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "stream": false,
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Decode(e.to_string()))?;

        extract_message(parsed)
    }
}

#[async_trait]
impl MessageGenerator for DeepSeekClient {
    async fn generate(&self, contact: &Contact, template: &str) -> Result<String, GenerationError> {
        info!("Generating message for contact {} ({})", contact.id, contact.full_name());
        self.complete(SYSTEM_PROMPT, build_prompt(contact, template), 300, 0.7)
            .await
    }

    async fn analyze_reply(&self, contact: &Contact, reply: &str) -> Result<String, GenerationError> {
        info!("Analyzing reply from contact {} ({})", contact.id, contact.full_name());
        self.complete(ANALYST_PROMPT, build_analysis_prompt(contact, reply), 400, 0.3)
            .await
    }
}
