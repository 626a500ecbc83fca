//! Field derivation from raw Halo records.
//!
//! Each local field is read from a configurable dotted path first, then from
//! a fixed chain of alternate names seen across Halo versions. The first
//! non-empty value wins; a field found nowhere becomes `""`.

use crmsync_connector_halo::{RemoteContact, RemoteOrganization, RemoteSite};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const ORG_NAME: &[&str] = &["name", "client_name"];
const ORG_EMAIL: &[&str] = &["email", "main_email", "emailaddress"];
const ORG_PHONE: &[&str] = &["main_phone", "phone_number", "phonenumber"];
const ORG_ADDRESS: &[&str] = &[
    "address.line1",
    "main_address.line1",
    "address_line1",
    "address",
];
const ORG_CITY: &[&str] = &["address.city", "city"];
const ORG_STATE: &[&str] = &["address.state", "address.county", "state", "region"];
const ORG_ZIP: &[&str] = &[
    "address.postcode",
    "address.zip",
    "postcode",
    "zip",
    "postal_code",
];

const CONTACT_EMAIL: &[&str] = &["emailaddress", "email"];
const CONTACT_PHONE: &[&str] = &["phonenumber", "mobilenumber", "phone_number", "phone"];

const SITE_ADDRESS: &[&str] = &["delivery_address.line1", "address.line1", "line1"];
const SITE_CITY: &[&str] = &["delivery_address.line2", "address.city", "city"];
const SITE_STATE: &[&str] = &["delivery_address.line3", "address.state", "state"];
const SITE_ZIP: &[&str] = &[
    "delivery_address.postcode",
    "address.postcode",
    "postcode",
    "zip",
];
const SITE_DEFAULT: &[&str] = &["isdefault", "is_default"];

/// Dotted-path overrides for organization fields.
///
/// A blank path means "fallback names only".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            name: "name".to_string(),
            email: "email".to_string(),
            phone: "phone_number".to_string(),
            address: "address.line1".to_string(),
            city: "address.city".to_string(),
            state: "address.state".to_string(),
            zip: "address.postcode".to_string(),
        }
    }
}

/// Organization fields after derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizationDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Contact fields after derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Site fields after derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteDetails {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub is_default: bool,
}

/// Looks up a dotted path such as `address.line1`.
///
/// Numeric segments index into arrays.
#[must_use]
pub fn lookup_path<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Text form of a scalar; objects, arrays, null and blank strings yield `None`.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First non-empty value along `configured` then `fallbacks`.
#[must_use]
pub fn first_non_empty(record: &Value, configured: Option<&str>, fallbacks: &[&str]) -> String {
    configured
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .into_iter()
        .chain(fallbacks.iter().copied())
        .find_map(|path| lookup_path(record, path).and_then(scalar_text))
        .unwrap_or_default()
}

fn truthy(record: &Value, fields: &[&str]) -> bool {
    fields
        .iter()
        .find_map(|field| lookup_path(record, field))
        .is_some_and(|value| match value {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_i64() == Some(1),
            Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
            _ => false,
        })
}

/// Derives local fields from remote records.
#[derive(Debug, Clone, Default)]
pub struct FieldDeriver {
    mapping: FieldMapping,
}

impl FieldDeriver {
    #[must_use]
    pub fn new(mapping: FieldMapping) -> Self {
        Self { mapping }
    }

    #[must_use]
    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    #[must_use]
    pub fn organization(&self, org: &RemoteOrganization) -> OrganizationDetails {
        let r = &org.record;
        let m = &self.mapping;
        OrganizationDetails {
            name: first_non_empty(r, Some(m.name.as_str()), ORG_NAME),
            email: first_non_empty(r, Some(m.email.as_str()), ORG_EMAIL),
            phone: first_non_empty(r, Some(m.phone.as_str()), ORG_PHONE),
            address: first_non_empty(r, Some(m.address.as_str()), ORG_ADDRESS),
            city: first_non_empty(r, Some(m.city.as_str()), ORG_CITY),
            state: first_non_empty(r, Some(m.state.as_str()), ORG_STATE),
            zip: first_non_empty(r, Some(m.zip.as_str()), ORG_ZIP),
        }
    }

    #[must_use]
    pub fn contact(&self, contact: &RemoteContact) -> ContactDetails {
        let r = &contact.record;
        let mut name = first_non_empty(r, None, &["name"]);
        if name.is_empty() {
            let first = first_non_empty(r, None, &["firstname"]);
            let last = first_non_empty(r, None, &["surname"]);
            name = format!("{first} {last}").trim().to_string();
        }
        ContactDetails {
            name,
            email: first_non_empty(r, None, CONTACT_EMAIL),
            phone: first_non_empty(r, None, CONTACT_PHONE),
        }
    }

    #[must_use]
    pub fn site(&self, site: &RemoteSite) -> SiteDetails {
        let r = &site.record;
        SiteDetails {
            name: first_non_empty(r, None, &["name"]),
            address: first_non_empty(r, None, SITE_ADDRESS),
            city: first_non_empty(r, None, SITE_CITY),
            state: first_non_empty(r, None, SITE_STATE),
            zip: first_non_empty(r, None, SITE_ZIP),
            is_default: truthy(r, SITE_DEFAULT),
        }
    }
}
