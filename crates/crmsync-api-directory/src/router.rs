//! Router and state for the directory sync API.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::services::sync_service::DirectorySyncService;

/// Shared state for directory sync routes.
#[derive(Clone)]
pub struct DirectorySyncState {
    pub service: Arc<DirectorySyncService>,
}

impl DirectorySyncState {
    pub fn new(service: DirectorySyncService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Directory sync routes:
/// - POST /integrations/halo/sync
/// - GET  /integrations/halo/status
pub fn directory_sync_router(state: DirectorySyncState) -> Router {
    Router::new()
        .route(
            "/integrations/halo/sync",
            post(handlers::sync::trigger_sync),
        )
        .route(
            "/integrations/halo/status",
            get(handlers::sync::sync_status),
        )
        .with_state(state)
}
