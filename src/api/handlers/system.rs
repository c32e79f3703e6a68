//! System endpoints: health check and API description.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::api::openapi::ApiDoc;
use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: String,
    version: &'static str,
    /// Number of non-empty collections, when the store is reachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    collections: Option<usize>,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, current timestamp and the number of collections in the store.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Store unreachable", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (status, collections) = match state.resources.collections().await {
        Ok(collections) => (StatusCode::OK, Some(collections.len())),
        Err(err) => {
            tracing::warn!(error = %err, "health check couldn't reach the store");
            (StatusCode::SERVICE_UNAVAILABLE, None)
        }
    };
    let body = HealthResponse {
        status: if status.is_success() { "healthy" } else { "degraded" },
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        collections,
    };
    (status, Json(body))
}

/// `GET /api-docs/openapi.json`: OpenAPI description of the REST API.
pub async fn openapi_handler() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api-docs/openapi.json", get(openapi_handler))
}
