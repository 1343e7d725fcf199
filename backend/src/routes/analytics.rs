// src/routes/analytics.rs
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::EngineError;
use crate::lifecycle::Analytics;
use crate::routes::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub campaign_id: Option<Uuid>,
}

/// GET /analytics?campaign_id=
pub async fn analytics_handler(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Analytics>, EngineError> {
    Ok(Json(state.engine.get_analytics(query.campaign_id).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use uuid::Uuid;

    use crate::routes::test_util::{empty_request, json_request, send, test_app};

    #[tokio::test]
    async fn test_analytics_for_campaign() {
        let app = test_app().await;
        let (_, created) = send(&app, json_request("POST", "/campaigns", json!({ "name": "Stats" }))).await;
        let id = created["id"].as_str().unwrap().to_string();
        send(
            &app,
            json_request(
                "POST",
                &format!("/campaigns/{id}/contacts"),
                json!([
                    { "linkedin_url": "https://www.linkedin.com/in/a", "first_name": "Ann", "company": "Acme" },
                    { "linkedin_url": "https://www.linkedin.com/in/b", "first_name": "Bob", "company": "Acme" }
                ]),
            ),
        )
        .await;

        let (status, analytics) = send(&app, empty_request("GET", &format!("/analytics?campaign_id={id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(analytics["total_contacts"], 2);
        assert_eq!(analytics["status_counts"]["created"], 2);
        assert_eq!(analytics["connection_rate"], 0.0);
        assert_eq!(analytics["top_companies"][0]["company"], "Acme");
    }

    #[tokio::test]
    async fn test_unknown_campaign_is_not_found() {
        let app = test_app().await;
        let uri = format!("/analytics?campaign_id={}", Uuid::new_v4());
        let (status, _) = send(&app, empty_request("GET", &uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
