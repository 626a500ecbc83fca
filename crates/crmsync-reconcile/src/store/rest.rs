//! Record store backed by the hosted platform's entity API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use super::{RecordStore, StoreError, StoreResult};
use crate::models::{
    CustomerFields, CustomerFilter, IntegrationSettings, LocalCustomer, LocalSite, SettingsPatch,
    SiteFields,
};

const CUSTOMER: &str = "Customer";
const SITE: &str = "Site";
const SETTINGS: &str = "IntegrationSettings";

const API_KEY_HEADER: &str = "api_key";

/// Maximum error body length kept in [`StoreError::Status`].
const MAX_ERROR_BODY: usize = 2000;

/// REST adapter for the entity API.
pub struct RestRecordStore {
    http_client: Client,
    base_url: String,
    api_key: SecretString,
}

impl std::fmt::Debug for RestRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestRecordStore")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestRecordStore {
    /// Creates a store for `base_url` (e.g. `https://app.example.com/api/apps/123`).
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| StoreError::Http {
                url: base_url.clone(),
                source,
            })?;

        Ok(Self {
            http_client,
            base_url,
            api_key,
        })
    }

    fn entity_url(&self, entity: &str) -> String {
        format!("{}/entities/{}", self.base_url, entity)
    }

    fn record_url(&self, entity: &str, id: &str) -> String {
        format!(
            "{}/entities/{}/{}",
            self.base_url,
            entity,
            urlencoding::encode(id)
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(API_KEY_HEADER, self.api_key.expose_secret())
    }

    /// Sends a request and decodes a JSON answer.
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder, url: &str) -> StoreResult<T> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|source| StoreError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| StoreError::Http {
            url: url.to_string(),
            source,
        })?;

        debug!(url = %url, status = %status, "Store response");

        if !status.is_success() {
            let mut body = body;
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
                body.push_str("...");
            }
            return Err(StoreError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| StoreError::Decode(format!("{url}: {e}")))
    }

    async fn list<T: DeserializeOwned>(&self, entity: &str) -> StoreResult<Vec<T>> {
        let url = self.entity_url(entity);
        self.send(self.http_client.get(&url), &url).await
    }

    async fn filter<T: DeserializeOwned, Q: Serialize + Sync>(
        &self,
        entity: &str,
        query: &Q,
    ) -> StoreResult<Vec<T>> {
        let url = self.entity_url(entity);
        let q = serde_json::to_string(query).map_err(|e| StoreError::Decode(e.to_string()))?;
        self.send(self.http_client.get(&url).query(&[("q", q)]), &url)
            .await
    }

    async fn create<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        entity: &str,
        body: &B,
    ) -> StoreResult<T> {
        let url = self.entity_url(entity);
        self.send(self.http_client.post(&url).json(body), &url).await
    }

    async fn bulk_create<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        entity: &str,
        batch: &[B],
    ) -> StoreResult<Vec<T>> {
        let url = format!("{}/bulk", self.entity_url(entity));
        self.send(self.http_client.post(&url).json(batch), &url)
            .await
    }

    async fn update<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        entity: &str,
        id: &str,
        body: &B,
    ) -> StoreResult<T> {
        let url = self.record_url(entity, id);
        self.send(self.http_client.put(&url).json(body), &url)
            .await
            .map_err(|e| e.or_not_found(entity, id))
    }
}

#[derive(Serialize)]
struct ProviderQuery<'a> {
    provider: &'a str,
}

#[async_trait]
impl RecordStore for RestRecordStore {
    #[instrument(skip(self))]
    async fn list_customers(&self) -> StoreResult<Vec<LocalCustomer>> {
        self.list(CUSTOMER).await
    }

    #[instrument(skip(self))]
    async fn filter_customers(&self, filter: &CustomerFilter) -> StoreResult<Vec<LocalCustomer>> {
        self.filter(CUSTOMER, filter).await
    }

    #[instrument(skip(self, fields), fields(external_id = %fields.external_id))]
    async fn create_customer(&self, fields: &CustomerFields) -> StoreResult<LocalCustomer> {
        self.create(CUSTOMER, fields).await
    }

    #[instrument(skip(self, batch), fields(batch_size = batch.len()))]
    async fn bulk_create_customers(
        &self,
        batch: &[CustomerFields],
    ) -> StoreResult<Vec<LocalCustomer>> {
        self.bulk_create(CUSTOMER, batch).await
    }

    #[instrument(skip(self, fields), fields(external_id = %fields.external_id))]
    async fn update_customer(
        &self,
        id: &str,
        fields: &CustomerFields,
    ) -> StoreResult<LocalCustomer> {
        self.update(CUSTOMER, id, fields).await
    }

    #[instrument(skip(self))]
    async fn list_sites(&self) -> StoreResult<Vec<LocalSite>> {
        self.list(SITE).await
    }

    #[instrument(skip(self, batch), fields(batch_size = batch.len()))]
    async fn bulk_create_sites(&self, batch: &[SiteFields]) -> StoreResult<Vec<LocalSite>> {
        self.bulk_create(SITE, batch).await
    }

    #[instrument(skip(self, fields), fields(external_id = %fields.external_id))]
    async fn update_site(&self, id: &str, fields: &SiteFields) -> StoreResult<LocalSite> {
        self.update(SITE, id, fields).await
    }

    #[instrument(skip(self))]
    async fn find_settings(&self, provider: &str) -> StoreResult<Option<IntegrationSettings>> {
        let records: Vec<IntegrationSettings> =
            self.filter(SETTINGS, &ProviderQuery { provider }).await?;
        Ok(records.into_iter().next())
    }

    #[instrument(skip(self, patch))]
    async fn update_settings(
        &self,
        id: &str,
        patch: &SettingsPatch,
    ) -> StoreResult<IntegrationSettings> {
        self.update(SETTINGS, id, patch).await
    }

    fn store_type(&self) -> &'static str {
        "rest"
    }
}
