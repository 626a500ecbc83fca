//! Halo API client: authentication and bounded collection reads.

use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

use crate::auth::{request_token, AccessToken};
use crate::{
    HaloConfig, HaloCredentials, HaloError, HaloResult, RemoteContact, RemoteOrganization,
    RemoteSite,
};

/// Keys under which Halo wraps collection payloads.
const WRAPPER_KEYS: &[&str] = &["clients", "users", "sites", "records"];

/// HaloPSA directory client.
#[derive(Debug)]
pub struct HaloClient {
    http_client: reqwest::Client,
    config: HaloConfig,
    credentials: HaloCredentials,
}

impl HaloClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns [`HaloError::Configuration`] when the credentials are blank or
    /// the HTTP client cannot be created.
    pub fn new(config: HaloConfig, credentials: HaloCredentials) -> HaloResult<Self> {
        credentials.validate()?;

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| HaloError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            config,
            credentials,
        })
    }

    #[must_use]
    pub fn config(&self) -> &HaloConfig {
        &self.config
    }

    /// Exchanges the client credentials for a bearer token.
    pub async fn authenticate(&self) -> HaloResult<AccessToken> {
        request_token(&self.http_client, &self.config, &self.credentials).await
    }

    /// Fetches organizations, up to the configured cap.
    #[instrument(skip(self, token))]
    pub async fn fetch_organizations(
        &self,
        token: &AccessToken,
    ) -> HaloResult<Vec<RemoteOrganization>> {
        let records = self
            .get_collection(token, "Client", self.config.organization_page_size)
            .await?;
        Ok(parse_records(records, "organization", RemoteOrganization::from_json))
    }

    /// Fetches contacts, up to the configured cap.
    #[instrument(skip(self, token))]
    pub async fn fetch_contacts(&self, token: &AccessToken) -> HaloResult<Vec<RemoteContact>> {
        let records = self
            .get_collection(token, "Users", self.config.contact_page_size)
            .await?;
        Ok(parse_records(records, "contact", RemoteContact::from_json))
    }

    /// Fetches sites, up to the configured cap.
    #[instrument(skip(self, token))]
    pub async fn fetch_sites(&self, token: &AccessToken) -> HaloResult<Vec<RemoteSite>> {
        let records = self
            .get_collection(token, "Site", self.config.site_page_size)
            .await?;
        Ok(parse_records(records, "site", RemoteSite::from_json))
    }

    /// Issues one authenticated GET and unwraps the record array.
    async fn get_collection(
        &self,
        token: &AccessToken,
        resource: &str,
        count: usize,
    ) -> HaloResult<Vec<Value>> {
        let url = self.config.resource_url(resource, count);
        debug!(%url, "Fetching Halo collection");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|e| HaloError::network(&url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| HaloError::network(&url, e))?;

        if !status.is_success() {
            return Err(HaloError::remote_api(&url, status.as_u16(), body));
        }

        let payload: Value = serde_json::from_str(&body)
            .map_err(|e| HaloError::invalid_response(&url, format!("Body is not JSON: {e}")))?;

        let records = unwrap_collection(payload)
            .ok_or_else(|| HaloError::invalid_response(&url, "No record array in response"))?;

        if records.len() >= count {
            warn!(
                resource,
                count,
                "Halo returned a full page; records beyond the cap are not synchronized"
            );
        }

        info!(resource, fetched = records.len(), "Fetched Halo collection");
        Ok(records)
    }
}

/// Accepts a bare array or an object wrapping one under a known key.
fn unwrap_collection(payload: Value) -> Option<Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => WRAPPER_KEYS.iter().find_map(|key| match map.remove(*key) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        }),
        _ => None,
    }
}

fn parse_records<T>(records: Vec<Value>, kind: &str, parse: fn(Value) -> Option<T>) -> Vec<T> {
    let total = records.len();
    let parsed: Vec<T> = records.into_iter().filter_map(parse).collect();
    if parsed.len() < total {
        warn!(
            kind,
            skipped = total - parsed.len(),
            "Skipped Halo records without an id"
        );
    }
    parsed
}

/// Parses a comma separated exclusion list, ignoring blanks.
#[must_use]
pub fn parse_excluded_ids(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

/// Drops excluded organizations. Returns the kept organizations and how many
/// were dropped.
#[must_use]
pub fn exclude_organizations(
    organizations: Vec<RemoteOrganization>,
    excluded: &HashSet<String>,
) -> (Vec<RemoteOrganization>, usize) {
    if excluded.is_empty() {
        return (organizations, 0);
    }
    let before = organizations.len();
    let kept: Vec<RemoteOrganization> = organizations
        .into_iter()
        .filter(|org| !excluded.contains(&org.id))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}
