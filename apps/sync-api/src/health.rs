//! Liveness endpoint.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

/// State for the health route.
#[derive(Debug, Clone)]
pub struct HealthState {
    pub start_time: Instant,
    pub version: &'static str,
    pub store_type: &'static str,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Record store backing the service (`memory` or `rest`).
    pub store: String,
}

pub fn health_routes(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is running", body = HealthResponse)),
    tag = "Health"
)]
pub async fn health_handler(State(state): State<Arc<HealthState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: state.version.to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        store: state.store_type.to_string(),
    })
}
