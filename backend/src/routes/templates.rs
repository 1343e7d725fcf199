// src/routes/templates.rs
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::db::models::{MessageTemplate, NewTemplate, TemplateType, Variant};
use crate::error::EngineError;
use crate::routes::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TemplateQuery {
    pub template_type: Option<TemplateType>,
    pub variant: Option<Variant>,
}

/// GET /templates?template_type=&variant=
pub async fn list_templates_handler(
    State(state): State<AppState>,
    Query(query): Query<TemplateQuery>,
) -> Result<Json<Vec<MessageTemplate>>, EngineError> {
    let templates = state
        .engine
        .list_templates(query.template_type, query.variant)
        .await?;
    Ok(Json(templates))
}

/// POST /templates
pub async fn create_template_handler(
    State(state): State<AppState>,
    Json(body): Json<NewTemplate>,
) -> Result<(StatusCode, Json<MessageTemplate>), EngineError> {
    let template = state.engine.create_template(body, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

/// POST /templates/seed
pub async fn seed_templates_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<MessageTemplate>>, EngineError> {
    Ok(Json(state.engine.seed_default_templates(Utc::now()).await?))
}
