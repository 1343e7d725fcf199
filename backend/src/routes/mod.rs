// src/routes/mod.rs

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::error;

use crate::config::Config;
use crate::error::EngineError;
use crate::import::ImportError;
use crate::lifecycle::{CancelToken, Engine};

pub mod analytics;
pub mod campaigns;
pub mod contacts;
pub mod templates;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    /// Used for spreadsheet downloads.
    pub http: reqwest::Client,
    pub config: Config,
    /// Cancelled on shutdown; batches started over HTTP stop between contacts.
    pub cancel: CancelToken,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/campaigns",
            get(campaigns::list_campaigns_handler).post(campaigns::create_campaign_handler),
        )
        .route(
            "/campaigns/:id",
            get(campaigns::get_campaign_handler).delete(campaigns::delete_campaign_handler),
        )
        .route("/campaigns/:id/status", post(campaigns::set_status_handler))
        .route("/campaigns/:id/launch", post(campaigns::launch_handler))
        .route("/campaigns/:id/sync", post(campaigns::sync_handler))
        .route("/sync", post(campaigns::sync_all_handler))
        .route("/campaigns/:id/contacts", post(contacts::add_contacts_handler))
        .route("/campaigns/:id/import", post(contacts::import_handler))
        .route("/contacts", get(contacts::list_contacts_handler))
        .route("/contacts/followup", get(contacts::eligible_contacts_handler))
        .route("/contacts/:id", get(contacts::get_contact_handler))
        .route("/contacts/:id/analyze", post(contacts::analyze_reply_handler))
        .route("/followups/run", post(contacts::run_followups_handler))
        .route("/analytics", get(analytics::analytics_handler))
        .route(
            "/templates",
            get(templates::list_templates_handler).post(templates::create_template_handler),
        )
        .route("/templates/seed", post(templates::seed_templates_handler))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Response {
    if let Err(err) = sqlx::query("SELECT 1").execute(state.engine.pool()).await {
        error!("DB health check failed: {:?}", err);
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "error",
                "db": "down",
            })),
        )
            .into_response();
    }

    Json(json!({
        "status": "ok",
        "env": format!("{:?}", state.config.env),
    }))
    .into_response()
}

impl EngineError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::IllegalTransition { .. }
            | EngineError::CampaignTransition { .. }
            | EngineError::Conflict { .. } => StatusCode::CONFLICT,
            EngineError::TemplateMissing { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Gateway(_) | EngineError::Generation(_) => StatusCode::BAD_GATEWAY,
            EngineError::Import(ImportError::Download(_)) => StatusCode::BAD_GATEWAY,
            EngineError::Import(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::{router, AppState};
    use crate::config::test_config;
    use crate::lifecycle::test_support::test_engine;
    use crate::lifecycle::{CancelToken, Engine};

    pub async fn test_app() -> Router {
        let (engine, _, _) = test_engine().await;
        test_app_with(engine)
    }

    pub fn test_app_with(engine: Engine) -> Router {
        router(AppState {
            engine: Arc::new(engine),
            http: reqwest::Client::new(),
            config: test_config(),
            cancel: CancelToken::new(),
        })
    }

    pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }
}
