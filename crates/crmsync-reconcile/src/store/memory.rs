//! In-process record store.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RecordStore, StoreError, StoreResult};
use crate::models::{
    CustomerFields, CustomerFilter, IntegrationSettings, LocalCustomer, LocalSite, SettingsPatch,
    SiteFields,
};

/// Record store held in memory. Used for local runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    customers: RwLock<Vec<LocalCustomer>>,
    sites: RwLock<Vec<LocalSite>>,
    settings: RwLock<Vec<IntegrationSettings>>,
    calls: AtomicUsize,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_customers(mut self, customers: Vec<LocalCustomer>) -> Self {
        self.customers = RwLock::new(customers);
        self
    }

    #[must_use]
    pub fn with_sites(mut self, sites: Vec<LocalSite>) -> Self {
        self.sites = RwLock::new(sites);
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: IntegrationSettings) -> Self {
        self.settings.get_mut().push(settings);
        self
    }

    pub async fn customers(&self) -> Vec<LocalCustomer> {
        self.customers.read().await.clone()
    }

    pub async fn sites(&self) -> Vec<LocalSite> {
        self.sites.read().await.clone()
    }

    pub async fn settings(&self) -> Vec<IntegrationSettings> {
        self.settings.read().await.clone()
    }

    /// Number of [`RecordStore`] calls served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn track(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    fn not_found(entity: &str, id: &str) -> StoreError {
        StoreError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn list_customers(&self) -> StoreResult<Vec<LocalCustomer>> {
        self.track();
        Ok(self.customers.read().await.clone())
    }

    async fn filter_customers(&self, filter: &CustomerFilter) -> StoreResult<Vec<LocalCustomer>> {
        self.track();
        Ok(self
            .customers
            .read()
            .await
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    async fn create_customer(&self, fields: &CustomerFields) -> StoreResult<LocalCustomer> {
        self.track();
        let mut customer = LocalCustomer {
            id: Self::new_id(),
            ..Default::default()
        };
        customer.apply(fields);
        self.customers.write().await.push(customer.clone());
        Ok(customer)
    }

    async fn update_customer(
        &self,
        id: &str,
        fields: &CustomerFields,
    ) -> StoreResult<LocalCustomer> {
        self.track();
        let mut customers = self.customers.write().await;
        let customer = customers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Self::not_found("Customer", id))?;
        customer.apply(fields);
        Ok(customer.clone())
    }

    async fn list_sites(&self) -> StoreResult<Vec<LocalSite>> {
        self.track();
        Ok(self.sites.read().await.clone())
    }

    async fn bulk_create_sites(&self, batch: &[SiteFields]) -> StoreResult<Vec<LocalSite>> {
        self.track();
        let created: Vec<LocalSite> = batch
            .iter()
            .map(|fields| {
                let mut site = LocalSite {
                    id: Self::new_id(),
                    ..Default::default()
                };
                site.apply(fields);
                site
            })
            .collect();
        self.sites.write().await.extend(created.iter().cloned());
        Ok(created)
    }

    async fn update_site(&self, id: &str, fields: &SiteFields) -> StoreResult<LocalSite> {
        self.track();
        let mut sites = self.sites.write().await;
        let site = sites
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Self::not_found("Site", id))?;
        site.apply(fields);
        Ok(site.clone())
    }

    async fn find_settings(&self, provider: &str) -> StoreResult<Option<IntegrationSettings>> {
        self.track();
        Ok(self
            .settings
            .read()
            .await
            .iter()
            .find(|s| s.provider == provider)
            .cloned())
    }

    async fn update_settings(
        &self,
        id: &str,
        patch: &SettingsPatch,
    ) -> StoreResult<IntegrationSettings> {
        self.track();
        let mut settings = self.settings.write().await;
        let record = settings
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Self::not_found("IntegrationSettings", id))?;
        if let Some(at) = patch.last_sync_at {
            record.last_sync_at = Some(at);
        }
        Ok(record.clone())
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}
