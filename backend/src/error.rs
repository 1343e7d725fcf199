use thiserror::Error;
use uuid::Uuid;

use crate::ai::GenerationError;
use crate::automation::GatewayError;
use crate::db::models::{CampaignStatus, ContactStatus, TemplateType, Variant};
use crate::import::ImportError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: ContactStatus, to: ContactStatus },

    #[error("campaign cannot move from {from} to {to}")]
    CampaignTransition {
        from: CampaignStatus,
        to: CampaignStatus,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("no {template_type} template available for variant {variant}")]
    TemplateMissing {
        variant: Variant,
        template_type: TemplateType,
    },

    #[error("automation gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("message generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("contact {id} was modified concurrently")]
    Conflict { id: Uuid },

    #[error("import error: {0}")]
    Import(#[from] ImportError),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        EngineError::NotFound { entity, id }
    }

    /// Storage failures end the running batch; everything else is per contact.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Storage(_))
    }
}
