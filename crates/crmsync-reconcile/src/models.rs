//! Local CRM records and the write payloads the engine produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// `source` tag stamped on every record this engine writes.
pub const SOURCE_TAG: &str = "halo";

/// External id of a synchronized organization.
#[must_use]
pub fn organization_external_id(remote_id: &str) -> String {
    format!("{SOURCE_TAG}_{remote_id}")
}

/// External id of a synchronized contact. Contacts live next to
/// organizations in the customer collection, hence the distinct prefix.
#[must_use]
pub fn contact_external_id(remote_id: &str) -> String {
    format!("{SOURCE_TAG}_contact_{remote_id}")
}

/// External id of a synchronized site.
#[must_use]
pub fn site_external_id(remote_id: &str) -> String {
    format!("{SOURCE_TAG}_site_{remote_id}")
}

/// True when `external_id` was written by this engine for any entity.
#[must_use]
pub fn is_source_linked(external_id: Option<&str>) -> bool {
    external_id.is_some_and(|id| {
        id.trim()
            .strip_prefix(SOURCE_TAG)
            .is_some_and(|rest| rest.starts_with('_'))
    })
}

/// The hosted store returns `null` for unset text fields.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_default())
}

/// A customer record: an organization (`is_company`) or one of its contacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalCustomer {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub phone: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub address: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub state: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub zip: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_company: bool,
    #[serde(default)]
    pub source: Option<String>,
    /// Owning organization, contacts only.
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
}

impl LocalCustomer {
    /// True for contacts written by this engine.
    #[must_use]
    pub fn is_synced_contact(&self) -> bool {
        !self.is_company && self.source.as_deref() == Some(SOURCE_TAG)
    }

    /// Applies a write payload, as the hosted store's partial update does.
    pub fn apply(&mut self, fields: &CustomerFields) {
        self.name.clone_from(&fields.name);
        self.email.clone_from(&fields.email);
        self.phone.clone_from(&fields.phone);
        if let Some(address) = &fields.address {
            self.address.clone_from(address);
        }
        if let Some(city) = &fields.city {
            self.city.clone_from(city);
        }
        if let Some(state) = &fields.state {
            self.state.clone_from(state);
        }
        if let Some(zip) = &fields.zip {
            self.zip.clone_from(zip);
        }
        self.external_id = Some(fields.external_id.clone());
        self.is_company = fields.is_company;
        self.source = Some(fields.source.clone());
        if fields.company_id.is_some() {
            self.company_id.clone_from(&fields.company_id);
            self.company_name.clone_from(&fields.company_name);
        }
    }
}

/// Fields written to a customer record.
///
/// Address fields are omitted for contacts so an update never blanks data
/// entered in the CRM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerFields {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    pub external_id: String,
    pub is_company: bool,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

/// Predicate for [`crate::RecordStore::filter_customers`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CustomerFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_company: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl CustomerFilter {
    /// Contacts previously written by this engine.
    #[must_use]
    pub fn synced_contacts() -> Self {
        Self {
            is_company: Some(false),
            source: Some(SOURCE_TAG.to_string()),
        }
    }

    #[must_use]
    pub fn matches(&self, customer: &LocalCustomer) -> bool {
        self.is_company.map_or(true, |v| customer.is_company == v)
            && self
                .source
                .as_deref()
                .map_or(true, |s| customer.source.as_deref() == Some(s))
    }
}

/// A physical site attached to a customer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalSite {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub address: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub state: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub zip: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_default: bool,
}

impl LocalSite {
    pub fn apply(&mut self, fields: &SiteFields) {
        self.name.clone_from(&fields.name);
        self.address.clone_from(&fields.address);
        self.city.clone_from(&fields.city);
        self.state.clone_from(&fields.state);
        self.zip.clone_from(&fields.zip);
        self.external_id = Some(fields.external_id.clone());
        self.customer_id = Some(fields.customer_id.clone());
        self.is_default = fields.is_default;
    }
}

/// Fields written to a site record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteFields {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub external_id: String,
    pub customer_id: String,
    pub is_default: bool,
}

/// The stored integration-settings record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrationSettings {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub provider: String,
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    /// Comma separated remote organization ids.
    #[serde(default)]
    pub excluded_client_ids: Option<String>,
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Partial update of [`IntegrationSettings`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
}
