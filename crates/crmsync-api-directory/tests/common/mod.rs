//! Common test utilities for crmsync-api-directory integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use crmsync_api_directory::{
    directory_sync_router, DirectorySyncService, DirectorySyncState, HaloEnvSettings,
};
use crmsync_reconcile::InMemoryStore;
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_TOKEN: &str = "api-test-token";

/// Wiremock stand-in for a Halo instance serving both auth and API roots.
pub struct MockHalo {
    pub server: MockServer,
}

impl MockHalo {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub async fn accept_token(&self) {
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": TEST_TOKEN,
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn reject_token(&self) {
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_client"})),
            )
            .mount(&self.server)
            .await;
    }

    pub async fn collection(&self, resource: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/api/{resource}")))
            .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn collection_error(&self, resource: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/api/{resource}")))
            .respond_with(ResponseTemplate::new(status).set_body_string("upstream failure"))
            .mount(&self.server)
            .await;
    }

    /// Token plus one organization with a contact and a site.
    pub async fn healthy_directory(&self) {
        self.accept_token().await;
        self.collection(
            "Client",
            json!([
                {"id": 1, "name": "Acme", "main_phone": "555-0100"},
                {"id": 2, "name": "Globex"}
            ]),
        )
        .await;
        self.collection(
            "Users",
            json!({"users": [{"id": 10, "name": "Jane Doe", "client_id": 1}]}),
        )
        .await;
        self.collection(
            "Site",
            json!({"sites": [{"id": 20, "name": "HQ", "client_id": 1, "isdefault": true}]}),
        )
        .await;
    }
}

pub fn env_settings(uri: &str) -> HaloEnvSettings {
    HaloEnvSettings {
        client_id: Some("client-id".into()),
        client_secret: Some(SecretString::from("client-secret".to_string())),
        tenant: None,
        auth_url: Some(format!("{uri}/auth")),
        api_url: Some(format!("{uri}/api/")),
        excluded_client_ids: String::new(),
    }
}

pub fn app(store: Arc<InMemoryStore>, settings: HaloEnvSettings) -> Router {
    let service = DirectorySyncService::new(store, settings);
    directory_sync_router(DirectorySyncState::new(service))
}

/// Sends a request and returns the status and JSON body.
pub async fn send(app: Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

pub async fn post_sync(app: Router, body: Option<&str>) -> (StatusCode, Value) {
    send(app, "POST", "/integrations/halo/sync", body).await
}
