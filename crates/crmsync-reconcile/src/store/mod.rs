//! Local record store adapter.
//!
//! The CRM's customer, site and integration-settings collections live in a
//! hosted platform. The engine only talks to them through [`RecordStore`].

mod memory;
mod rest;

pub use memory::InMemoryStore;
pub use rest::RestRecordStore;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::models::{
    CustomerFields, CustomerFilter, IntegrationSettings, LocalCustomer, LocalSite, SettingsPatch,
    SiteFields,
};

/// Record store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("Store request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The store answered with a non-success status.
    #[error("Store returned HTTP {status} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The record to update does not exist.
    #[error("{entity} record {id} not found")]
    NotFound { entity: String, id: String },

    /// The store's answer could not be decoded.
    #[error("Failed to decode store response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Turns a 404 into [`StoreError::NotFound`].
    #[must_use]
    pub fn or_not_found(self, entity: &str, id: &str) -> Self {
        match self {
            Self::Status { status: 404, .. } => Self::NotFound {
                entity: entity.to_string(),
                id: id.to_string(),
            },
            other => other,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Access to the CRM's collections.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every customer record.
    async fn list_customers(&self) -> StoreResult<Vec<LocalCustomer>>;

    /// Customer records matching `filter`.
    async fn filter_customers(&self, filter: &CustomerFilter) -> StoreResult<Vec<LocalCustomer>>;

    async fn create_customer(&self, fields: &CustomerFields) -> StoreResult<LocalCustomer>;

    /// Creates many customers in one call, returning the created records.
    ///
    /// The result may be shorter than `batch` when some records failed; the
    /// records it holds are persisted. The default is [`create_each`].
    async fn bulk_create_customers(
        &self,
        batch: &[CustomerFields],
    ) -> StoreResult<Vec<LocalCustomer>> {
        create_each(self, batch).await
    }

    async fn update_customer(&self, id: &str, fields: &CustomerFields)
        -> StoreResult<LocalCustomer>;

    async fn list_sites(&self) -> StoreResult<Vec<LocalSite>>;

    async fn bulk_create_sites(&self, batch: &[SiteFields]) -> StoreResult<Vec<LocalSite>>;

    async fn update_site(&self, id: &str, fields: &SiteFields) -> StoreResult<LocalSite>;

    /// The settings record for `provider`, if one has been saved.
    async fn find_settings(&self, provider: &str) -> StoreResult<Option<IntegrationSettings>>;

    async fn update_settings(
        &self,
        id: &str,
        patch: &SettingsPatch,
    ) -> StoreResult<IntegrationSettings>;

    /// Short name for logs.
    fn store_type(&self) -> &'static str;
}

/// Creates `batch` one record at a time.
///
/// A failed record is logged and left out of the result. The call only fails
/// when no record could be created.
pub async fn create_each<S>(store: &S, batch: &[CustomerFields]) -> StoreResult<Vec<LocalCustomer>>
where
    S: RecordStore + ?Sized,
{
    let mut created = Vec::with_capacity(batch.len());
    let mut first_error = None;
    for fields in batch {
        match store.create_customer(fields).await {
            Ok(customer) => created.push(customer),
            Err(e) => {
                warn!(external_id = %fields.external_id, error = %e, "Customer create failed");
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) if created.is_empty() => Err(e),
        _ => Ok(created),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_mapping() {
        let err = StoreError::Status {
            url: "http://store/entities/Customer/c1".into(),
            status: 404,
            body: String::new(),
        }
        .or_not_found("Customer", "c1");
        assert!(matches!(err, StoreError::NotFound { ref id, .. } if id == "c1"));

        let err = StoreError::Status {
            url: "http://store/entities/Customer/c1".into(),
            status: 500,
            body: "boom".into(),
        }
        .or_not_found("Customer", "c1");
        assert!(err.to_string().contains("HTTP 500"));
    }
}
