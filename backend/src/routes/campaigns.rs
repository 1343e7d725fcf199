// src/routes/campaigns.rs
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::models::{Campaign, CampaignStatus, NewCampaign};
use crate::error::EngineError;
use crate::lifecycle::{LaunchReport, SyncAllReport, SyncReport};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: CampaignStatus,
}

/// GET /campaigns
pub async fn list_campaigns_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<Campaign>>, EngineError> {
    Ok(Json(state.engine.list_campaigns().await?))
}

/// POST /campaigns
pub async fn create_campaign_handler(
    State(state): State<AppState>,
    Json(body): Json<NewCampaign>,
) -> Result<(StatusCode, Json<Campaign>), EngineError> {
    let campaign = state.engine.create_campaign(body, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// GET /campaigns/:id
pub async fn get_campaign_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Campaign>, EngineError> {
    Ok(Json(state.engine.get_campaign(id).await?))
}

/// DELETE /campaigns/:id
pub async fn delete_campaign_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, EngineError> {
    state.engine.delete_campaign(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /campaigns/:id/status  { "status": "paused" }
pub async fn set_status_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SetStatusRequest>,
) -> Result<Json<Campaign>, EngineError> {
    let campaign = state
        .engine
        .set_campaign_status(id, body.status, Utc::now())
        .await?;
    Ok(Json(campaign))
}

/// POST /campaigns/:id/launch
///
/// Sends connection requests to every contact not yet invited.
pub async fn launch_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LaunchReport>, EngineError> {
    let report = state
        .engine
        .launch_campaign(id, Utc::now(), &state.cancel)
        .await?;
    Ok(Json(report))
}

/// POST /campaigns/:id/sync
pub async fn sync_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SyncReport>, EngineError> {
    let report = state
        .engine
        .sync_campaign(id, Utc::now(), &state.cancel)
        .await?;
    Ok(Json(report))
}

/// POST /sync
///
/// Syncs every active campaign, one after another.
pub async fn sync_all_handler(
    State(state): State<AppState>,
) -> Result<Json<SyncAllReport>, EngineError> {
    let report = state
        .engine
        .sync_active_campaigns(Utc::now(), &state.cancel)
        .await?;
    Ok(Json(report))
}
