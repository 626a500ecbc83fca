//! Request and response bodies for the directory sync API.

use chrono::{DateTime, Utc};
use crmsync_reconcile::{ConnectionSample, FieldMapping, SyncReport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Body of `POST /integrations/halo/sync`. The whole body is optional.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequestBody {
    /// Authenticate and sample organizations without writing anything.
    #[serde(default)]
    pub test_only: bool,

    /// Per-field overrides of the organization field mapping.
    #[serde(default)]
    pub field_mapping: Option<FieldMappingBody>,
}

/// Dotted source paths for organization fields, e.g. `address.line1`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct FieldMappingBody {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

impl FieldMappingBody {
    /// Applies the provided keys over the default mapping.
    #[must_use]
    pub fn into_mapping(self) -> FieldMapping {
        let defaults = FieldMapping::default();
        FieldMapping {
            name: self.name.unwrap_or(defaults.name),
            email: self.email.unwrap_or(defaults.email),
            phone: self.phone.unwrap_or(defaults.phone),
            address: self.address.unwrap_or(defaults.address),
            city: self.city.unwrap_or(defaults.city),
            state: self.state.unwrap_or(defaults.state),
            zip: self.zip.unwrap_or(defaults.zip),
        }
    }
}

/// Result of a completed sync.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    /// Organizations created.
    pub created: usize,
    /// Organizations updated.
    pub updated: usize,
    pub users_created: usize,
    pub users_updated: usize,
    pub sites_created: usize,
    pub sites_updated: usize,
    /// Organizations linked by email or name instead of external id.
    pub matched: usize,
    /// Remote organizations considered after exclusions.
    pub total: usize,
    /// Degraded phases, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl From<&SyncReport> for SyncResponse {
    fn from(report: &SyncReport) -> Self {
        Self {
            success: true,
            message: report.message(),
            created: report.organizations.created,
            updated: report.organizations.updated,
            users_created: report.contacts.created,
            users_updated: report.contacts.updated,
            sites_created: report.sites.created,
            sites_updated: report.sites.updated,
            matched: report.organizations.matched,
            total: report
                .total_organizations
                .saturating_sub(report.excluded_organizations),
            warnings: report.warnings.clone(),
        }
    }
}

/// Result of a test-only run.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionResponse {
    pub success: bool,
    pub test_only: bool,
    pub message: String,
    /// Organizations visible after exclusions.
    pub count: usize,
    /// Sorted field names of the first organization.
    pub sample_fields: Vec<String>,
    /// The first organization as returned by Halo.
    #[schema(value_type = Option<Object>)]
    pub example: Option<Value>,
}

impl From<ConnectionSample> for TestConnectionResponse {
    fn from(sample: ConnectionSample) -> Self {
        Self {
            success: true,
            test_only: true,
            message: sample.message(),
            count: sample.count,
            sample_fields: sample.sample_fields,
            example: sample.example,
        }
    }
}

/// Body of `GET /integrations/halo/status`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusResponse {
    /// Whether credentials and base URLs are all available.
    pub configured: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub excluded_client_ids: Vec<String>,
}
