// src/lifecycle/templates.rs
//
// Template selection, fallback and placeholder rendering.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::models::{Campaign, Contact, MessageTemplate, NewTemplate, TemplateType, Variant};
use crate::db::templates as template_db;
use crate::error::{EngineError, EngineResult};
use crate::lifecycle::{Engine, EngineConfig};

/// Replace `{first_name}`, `{last_name}`, `{name}`, `{company}`, `{job_title}`
/// and `{linkedin_url}` with the contact's values. Missing values become empty
/// strings; unknown tokens are left as they are.
pub fn render_template(template: &str, contact: &Contact) -> String {
    let opt = |value: &Option<String>| value.clone().unwrap_or_default();

    template
        .replace("{first_name}", &contact.first_name)
        .replace("{last_name}", &opt(&contact.last_name))
        .replace("{name}", &contact.full_name())
        .replace("{company}", &opt(&contact.company))
        .replace("{job_title}", &opt(&contact.job_title))
        .replace("{linkedin_url}", &contact.linkedin_url)
}

/// Most recent active template for `(variant, template_type)`.
/// Ties on `created_at` go to the larger id.
pub fn pick_template(
    templates: &[MessageTemplate],
    variant: Variant,
    template_type: TemplateType,
) -> Option<&MessageTemplate> {
    templates
        .iter()
        .filter(|t| t.is_active && t.variant == variant && t.template_type == template_type)
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
}

/// Where a resolved template came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSource {
    Stored(Uuid),
    Campaign,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTemplate {
    pub content: String,
    pub source: TemplateSource,
}

/// Choose the template text for one action.
///
/// connection: stored template, else the campaign's own template, else the
/// configured default. followup: stored template, else the configured default.
pub fn resolve_template(
    templates: &[MessageTemplate],
    variant: Variant,
    template_type: TemplateType,
    campaign: Option<&Campaign>,
    config: &EngineConfig,
) -> EngineResult<ResolvedTemplate> {
    if let Some(stored) = pick_template(templates, variant, template_type) {
        return Ok(ResolvedTemplate {
            content: stored.content.clone(),
            source: TemplateSource::Stored(stored.id),
        });
    }

    if template_type == TemplateType::Connection {
        let campaign_template = campaign
            .and_then(|c| c.connection_template.as_deref())
            .filter(|t| !t.trim().is_empty());
        if let Some(content) = campaign_template {
            return Ok(ResolvedTemplate {
                content: content.to_string(),
                source: TemplateSource::Campaign,
            });
        }
    }

    let default = match template_type {
        TemplateType::Connection => config.default_connection_template.as_deref(),
        TemplateType::Followup => config.default_followup_template.as_deref(),
    };

    default
        .filter(|t| !t.trim().is_empty())
        .map(|content| ResolvedTemplate {
            content: content.to_string(),
            source: TemplateSource::Default,
        })
        .ok_or(EngineError::TemplateMissing {
            variant,
            template_type,
        })
}

/// Built-in connection and follow-up templates for every variant.
pub fn default_templates() -> Vec<NewTemplate> {
    Variant::ALL
        .into_iter()
        .flat_map(|variant| {
            let (connection, followup) = default_texts(variant);
            [
                (TemplateType::Connection, connection),
                (TemplateType::Followup, followup),
            ]
            .into_iter()
            .map(move |(template_type, content)| NewTemplate {
                name: format!("Default {} - {}", title(template_type.as_str()), title(variant.as_str())),
                variant,
                template_type,
                content: content.to_string(),
            })
        })
        .collect()
}

fn default_texts(variant: Variant) -> (&'static str, &'static str) {
    match variant {
        Variant::Networking => (
            "Hi {first_name}, I noticed your work at {company}. Would love to connect and exchange ideas about the industry.",
            "Hi {first_name}, thanks for connecting! I'd love to learn more about your work at {company}. Would you be open to a quick chat about {job_title} trends?",
        ),
        Variant::BusinessOpportunity => (
            "Hi {first_name}, I came across your profile and was impressed by your work at {company}. I'd love to connect and explore potential collaboration opportunities.",
            "Hi {first_name}, thanks for connecting! I'd love to discuss potential business opportunities that could benefit both of us. Are you open to a brief call?",
        ),
        Variant::IndustryInsights => (
            "Hi {first_name}, I've been following the great work you're doing at {company}. Would love to connect and share insights about {job_title} developments.",
            "Hi {first_name}, thanks for connecting! I'd love to share some industry insights I've gathered and hear your perspective. Would you be interested in a quick discussion?",
        ),
        Variant::Collaboration => (
            "Hi {first_name}, I'm impressed by your {job_title} work at {company}. I'd love to connect and explore potential collaboration opportunities.",
            "Hi {first_name}, thanks for connecting! I'd love to discuss potential collaboration opportunities that could be mutually beneficial. Are you open to exploring this further?",
        ),
        Variant::Mentorship => (
            "Hi {first_name}, I admire your career journey and work at {company}. I'd love to connect and potentially learn from your experience in {job_title}.",
            "Hi {first_name}, thanks for connecting! I'd love to learn from your experience in {job_title}. Would you be open to sharing some insights or advice?",
        ),
    }
}

/// "business_opportunity" -> "Business Opportunity"
fn title(snake: &str) -> String {
    snake
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl Engine {
    /// Resolve the template for `contact` and have the generator personalize it.
    ///
    /// A generator failure never fails the contact: the template is rendered
    /// as-is instead. The flag reports whether that fallback was taken.
    pub(super) async fn compose_message(
        &self,
        contact: &Contact,
        templates: &[MessageTemplate],
        template_type: TemplateType,
        campaign: Option<&Campaign>,
    ) -> EngineResult<(String, bool)> {
        let resolved = resolve_template(templates, contact.variant, template_type, campaign, &self.config)?;

        match self.generator.generate(contact, &resolved.content).await {
            Ok(text) => Ok((text, false)),
            Err(err) => {
                warn!(
                    "Message generation failed for contact {}: {}; using template text",
                    contact.id, err
                );
                Ok((render_template(&resolved.content, contact), true))
            }
        }
    }

    pub async fn create_template(
        &self,
        new: NewTemplate,
        now: DateTime<Utc>,
    ) -> EngineResult<MessageTemplate> {
        if new.name.trim().is_empty() {
            return Err(EngineError::Validation("template name must not be empty".into()));
        }
        if new.content.trim().is_empty() {
            return Err(EngineError::Validation("template content must not be empty".into()));
        }

        let template = template_db::insert_template(&self.pool, &new, now).await?;
        info!(
            "Created {} template '{}' for variant {}",
            template.template_type, template.name, template.variant
        );
        Ok(template)
    }

    pub async fn list_templates(
        &self,
        template_type: Option<TemplateType>,
        variant: Option<Variant>,
    ) -> EngineResult<Vec<MessageTemplate>> {
        Ok(template_db::list_templates(&self.pool, template_type, variant).await?)
    }

    /// Insert the built-in template for every (variant, type) pair that has
    /// no active template yet. Returns what was inserted.
    pub async fn seed_default_templates(&self, now: DateTime<Utc>) -> EngineResult<Vec<MessageTemplate>> {
        let existing = template_db::list_templates(&self.pool, None, None).await?;
        let mut created = Vec::new();

        for new in default_templates() {
            if pick_template(&existing, new.variant, new.template_type).is_some() {
                continue;
            }
            let template = template_db::insert_template(&self.pool, &new, now).await?;
            info!("Initialized default template: {}", template.name);
            created.push(template);
        }

        Ok(created)
    }
}
