// src/routes/contacts.rs
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::db::models::{Contact, ContactFilter, NewContact};
use crate::error::EngineError;
use crate::lifecycle::{FollowupReport, ImportReport};
use crate::routes::AppState;

/// GET /contacts?campaign_id=&status=&variant=&company=
pub async fn list_contacts_handler(
    State(state): State<AppState>,
    Query(filter): Query<ContactFilter>,
) -> Result<Json<Vec<Contact>>, EngineError> {
    Ok(Json(state.engine.list_contacts(&filter).await?))
}

/// GET /contacts/:id
pub async fn get_contact_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Contact>, EngineError> {
    Ok(Json(state.engine.get_contact(id).await?))
}

/// POST /contacts/:id/analyze
///
/// Assess the contact's latest reply and store the analysis on the contact.
pub async fn analyze_reply_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Contact>, EngineError> {
    Ok(Json(state.engine.analyze_reply(id, Utc::now()).await?))
}

/// GET /contacts/followup
///
/// Contacts the next follow-up run would message.
pub async fn eligible_contacts_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<Contact>>, EngineError> {
    Ok(Json(state.engine.eligible_contacts(Utc::now()).await?))
}

/// POST /followups/run
pub async fn run_followups_handler(
    State(state): State<AppState>,
) -> Result<Json<FollowupReport>, EngineError> {
    let report = state.engine.run_followups(Utc::now(), &state.cancel).await?;
    Ok(Json(report))
}

/// POST /campaigns/:id/contacts  [ { "linkedin_url": ..., "first_name": ... }, ... ]
pub async fn add_contacts_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(rows): Json<Vec<NewContact>>,
) -> Result<Json<ImportReport>, EngineError> {
    Ok(Json(state.engine.add_contacts(id, rows, Utc::now()).await?))
}

/// POST /campaigns/:id/import
///
/// A CSV body is imported as-is; an empty body downloads the campaign's
/// spreadsheet instead.
pub async fn import_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: String,
) -> Result<Json<ImportReport>, EngineError> {
    let now = Utc::now();
    let report = if body.trim().is_empty() {
        state.engine.import_spreadsheet(id, &state.http, now).await?
    } else {
        state.engine.import_csv(id, &body, now).await?
    };
    Ok(Json(report))
}
