//! Directory sync handlers.
//!
//! - POST /integrations/halo/sync - run a sync or a connection test
//! - GET  /integrations/halo/status - configuration and last sync time

use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use crmsync_reconcile::SyncOutcome;

use crate::error::{ApiError, ErrorResponse};
use crate::models::{SyncRequestBody, SyncResponse, SyncStatusResponse, TestConnectionResponse};
use crate::router::DirectorySyncState;

/// An empty or `null` body means "all defaults".
fn parse_body(bytes: &[u8]) -> Result<SyncRequestBody, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(SyncRequestBody::default());
    }
    serde_json::from_slice::<Option<SyncRequestBody>>(bytes)
        .map(Option::unwrap_or_default)
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))
}

/// POST /integrations/halo/sync
#[utoipa::path(
    post,
    path = "/integrations/halo/sync",
    request_body(content = SyncRequestBody, description = "Optional run parameters", content_type = "application/json"),
    responses(
        (status = 200, description = "Sync completed; with testOnly the body is a TestConnectionResponse", body = SyncResponse),
        (status = 400, description = "Missing configuration or malformed body", body = ErrorResponse),
        (status = 401, description = "Halo rejected the client credentials", body = ErrorResponse),
        (status = 500, description = "Halo or the record store failed", body = ErrorResponse),
    ),
    tag = "Directory Sync"
)]
pub async fn trigger_sync(
    State(state): State<DirectorySyncState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let body = parse_body(&body)?;

    let response = match state.service.run(body).await? {
        SyncOutcome::TestOnly(sample) => {
            Json(TestConnectionResponse::from(sample)).into_response()
        }
        SyncOutcome::Completed(report) => Json(SyncResponse::from(&report)).into_response(),
    };
    Ok(response)
}

/// GET /integrations/halo/status
#[utoipa::path(
    get,
    path = "/integrations/halo/status",
    responses(
        (status = 200, description = "Sync configuration state", body = SyncStatusResponse),
        (status = 500, description = "Record store failed", body = ErrorResponse),
    ),
    tag = "Directory Sync"
)]
pub async fn sync_status(
    State(state): State<DirectorySyncState>,
) -> Result<Json<SyncStatusResponse>, ApiError> {
    Ok(Json(state.service.status().await?))
}
