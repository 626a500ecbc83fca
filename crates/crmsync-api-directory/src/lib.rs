//! HaloPSA directory sync endpoints.
//!
//! This crate exposes the reconciliation engine over HTTP:
//! - `POST /integrations/halo/sync` runs a sync, or a connection test with
//!   `{"testOnly": true}`
//! - `GET /integrations/halo/status` reports configuration state and the
//!   last completed sync
//!
//! # Example
//!
//! ```rust,ignore
//! use crmsync_api_directory::{directory_sync_router, DirectorySyncService, DirectorySyncState};
//!
//! let service = DirectorySyncService::new(store, halo_settings);
//! let app = Router::new().merge(directory_sync_router(DirectorySyncState::new(service)));
//! ```

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod settings;

use utoipa::OpenApi;

// Re-export public API
pub use error::{ApiError, ErrorResponse};
pub use router::{directory_sync_router, DirectorySyncState};
pub use services::sync_service::DirectorySyncService;
pub use settings::HaloEnvSettings;

/// `OpenAPI` fragment for the directory sync routes.
#[derive(OpenApi)]
#[openapi(
    paths(handlers::sync::trigger_sync, handlers::sync::sync_status),
    components(schemas(
        models::SyncRequestBody,
        models::FieldMappingBody,
        models::SyncResponse,
        models::TestConnectionResponse,
        models::SyncStatusResponse,
        ErrorResponse,
    )),
    tags((name = "Directory Sync", description = "HaloPSA organization, contact and site sync"))
)]
pub struct DirectorySyncApi;
