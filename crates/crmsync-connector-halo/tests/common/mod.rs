//! Common test utilities for crmsync-connector-halo integration tests.

#![allow(dead_code)]

use crmsync_connector_halo::{HaloClient, HaloConfig, HaloCredentials};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_TOKEN: &str = "test-access-token";

/// Test data factory for Halo clients.
pub fn create_test_client(id: u64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "main_phone": "555-0100",
        "address": {
            "line1": "1 Main Street",
            "city": "Springfield",
            "state": "IL",
            "postcode": "62701"
        }
    })
}

/// Test data factory for Halo users.
pub fn create_test_user(id: u64, client_id: u64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "client_id": client_id,
        "emailaddress": format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        "phonenumber": "555-0199"
    })
}

/// Test data factory for Halo sites.
pub fn create_test_site(id: u64, client_id: u64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "client_id": client_id,
        "isdefault": true,
        "delivery_address": {
            "line1": "1 Main Street",
            "line2": "Springfield",
            "line3": "IL",
            "postcode": "62701"
        }
    })
}

/// Creates a mock OAuth token response.
pub fn create_token_response(access_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3600
    })
}

/// Mock server wrapper with common setup helpers.
pub struct MockHaloServer {
    pub server: MockServer,
}

impl MockHaloServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Builds a client pointed at this server.
    pub fn client(&self, tenant: Option<&str>) -> HaloClient {
        let config = HaloConfig::builder()
            .auth_url(format!("{}/auth/", self.url()))
            .api_url(format!("{}/api", self.url()))
            .tenant(tenant.map(String::from))
            .build()
            .expect("valid test config");
        HaloClient::new(config, HaloCredentials::new("test-client", "test-secret"))
            .expect("valid test credentials")
    }

    pub async fn mock_token_endpoint(&self) {
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(create_token_response(TEST_TOKEN)))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_token_rejected(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Mounts a collection endpoint that requires the test bearer token.
    pub async fn mock_collection(&self, resource: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/api/{resource}")))
            .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_collection_error(&self, resource: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/api/{resource}")))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_clients_with_count(&self, count: usize, clients: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path("/api/Client"))
            .and(query_param("count", count.to_string().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "record_count": clients.len(),
                "clients": clients
            })))
            .mount(&self.server)
            .await;
    }
}
