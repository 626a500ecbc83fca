//! `OpenAPI` document for the sync service.

use axum::{routing::get, Json, Router};
use crmsync_api_directory::DirectorySyncApi;
use utoipa::OpenApi;

use crate::health::HealthResponse;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "crmsync API",
        version = "0.1.0",
        description = "Synchronizes HaloPSA organizations, contacts and sites into the CRM"
    ),
    paths(crate::health::health_handler),
    components(schemas(HealthResponse)),
    tags((name = "Health", description = "Service liveness"))
)]
pub struct ApiDoc;

/// Service document with the directory sync routes merged in.
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.merge(DirectorySyncApi::openapi());
    doc
}

/// Serves the document at `/api-doc/openapi.json`.
pub fn docs_routes() -> Router {
    let doc = openapi();
    Router::new().route(
        "/api-doc/openapi.json",
        get(move || std::future::ready(Json(doc.clone()))),
    )
}
