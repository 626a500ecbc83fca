//! Error responses for the directory sync API.
//!
//! Every failure is rendered as `{ "error": ..., "details": ... }`. The
//! status reflects the cause: configuration problems are 400, a rejected
//! token exchange is 401, anything else is 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crmsync_connector_halo::HaloError;
use crmsync_reconcile::{StoreError, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use utoipa::ToSchema;

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable summary.
    pub error: String,
    /// Operator diagnostics such as the attempted URL and remote status/body.
    #[schema(value_type = Object)]
    pub details: Value,
}

/// Directory sync API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body is not valid JSON for this endpoint.
    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    /// The remote directory failed or is misconfigured.
    #[error(transparent)]
    Halo(#[from] HaloError),

    /// The record store failed before any work completed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Remote(e) => Self::Halo(e),
            SyncError::Store(e) => Self::Store(e),
        }
    }
}

impl ApiError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Halo(e) if e.is_configuration() => StatusCode::BAD_REQUEST,
            Self::Halo(e) if e.is_authentication() => StatusCode::UNAUTHORIZED,
            Self::Halo(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn to_error_response(&self) -> ErrorResponse {
        match self {
            Self::InvalidRequest(message) => ErrorResponse {
                error: "Invalid request body".to_string(),
                details: json!({ "message": message }),
            },
            Self::Halo(e) => {
                tracing::warn!(error = %e, "Halo sync failed");
                ErrorResponse {
                    error: e.to_string(),
                    details: e.details(),
                }
            }
            Self::Store(e) => {
                tracing::error!(error = %e, "Record store error during sync");
                ErrorResponse {
                    error: "Local record store error".to_string(),
                    details: json!({ "message": e.to_string() }),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_error_response())).into_response()
    }
}
