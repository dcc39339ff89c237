//! HTTP trigger surface
//!
//! Routes:
//! - `POST /api/scrape` (also `GET`, for schedulers that only issue GETs)
//! - `GET /health`

use crate::pipeline::{Pipeline, RunError};
use crate::trigger::TriggerContext;
use crate::SeedlineError;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Body returned when a run is refused or skipped
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    /// Error code for programmatic handling
    pub code: &'static str,
    /// Human-readable error message
    pub error: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
}

impl IntoResponse for RunError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            ok: false,
            code: self.code(),
            error: self.to_string(),
            skipped: self.is_skip(),
        };
        (status, Json(body)).into_response()
    }
}

/// Builds the router
pub fn app(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/api/scrape", get(scrape_handler).post(scrape_handler))
        .route("/health", get(health_handler))
        .with_state(pipeline)
}

/// Serves the trigger surface until Ctrl-C
pub async fn serve(pipeline: Arc<Pipeline>, bind: &str) -> Result<(), SeedlineError> {
    let listener = TcpListener::bind(bind).await?;
    tracing::info!(address = %listener.local_addr()?, "Trigger server listening");

    axum::serve(listener, app(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Trigger server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

async fn scrape_handler(State(pipeline): State<Arc<Pipeline>>, headers: HeaderMap) -> Response {
    let context = TriggerContext::from_headers(&headers);

    match pipeline.trigger(&context).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            tracing::info!(code = e.code(), status = e.status_code(), "Trigger refused");
            e.into_response()
        }
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::pipeline::RateLimiter;
    use crate::storage::{shared, SqliteStorage};
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    fn pipeline(enabled: bool, hardened: bool) -> Arc<Pipeline> {
        let toml = format!(
            r#"
[pipeline]
seeds = []

[user-agent]
crawler-name = "SeedlineBot"
crawler-version = "1.0"
contact-url = "https://example.com/bot"
contact-email = "bot@example.com"

[policy]
allowed-domains = ["example.com"]

[trigger]
secret = "s3cret"
enabled = {enabled}
hardened = {hardened}

[output]
database-path = "unused.db"
"#
        );
        let storage = shared(SqliteStorage::new_in_memory().unwrap());
        let pipeline = Pipeline::new(parse_config(&toml).unwrap(), "hash", storage)
            .unwrap()
            .with_rate_limiter(RateLimiter::new(Duration::ZERO, Duration::ZERO));
        Arc::new(pipeline)
    }

    fn scrape_request(token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/api/scrape");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(pipeline(true, false))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_token_is_401() {
        let response = app(pipeline(true, false))
            .oneshot(scrape_request(None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["code"], "unauthorized");
        assert!(body.get("skipped").is_none());
    }

    #[tokio::test]
    async fn test_kill_switch_is_503() {
        let response = app(pipeline(false, false))
            .oneshot(scrape_request(Some("s3cret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["code"], "disabled");
    }

    #[tokio::test]
    async fn test_hardened_without_marker_is_403() {
        let response = app(pipeline(true, true))
            .oneshot(scrape_request(Some("s3cret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_hardened_with_cron_header_runs() {
        let request = Request::builder()
            .method("GET")
            .uri("/api/scrape")
            .header(header::AUTHORIZATION, "Bearer s3cret")
            .header(crate::trigger::CRON_HEADER, "1")
            .body(Body::empty())
            .unwrap();

        let response = app(pipeline(true, true)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_held_lock_is_423_and_skipped() {
        let pipeline = pipeline(true, false);
        assert!(crate::lock::acquire_lock(pipeline.storage(), "scrape", 10));

        let response = app(pipeline).oneshot(scrape_request(Some("s3cret"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::LOCKED);
        let body = json_body(response).await;
        assert_eq!(body["skipped"], true);
        assert_eq!(body["code"], "already_running");
    }

    #[tokio::test]
    async fn test_successful_run_returns_summary() {
        let response = app(pipeline(true, false))
            .oneshot(scrape_request(Some("s3cret")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["results"], serde_json::json!([]));
        assert_eq!(body["summary"]["urls_processed"], 0);
    }
}
