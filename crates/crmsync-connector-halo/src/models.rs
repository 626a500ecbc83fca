//! Remote records as returned by the Halo API.
//!
//! Records keep their raw JSON: field names vary between Halo versions and
//! tenants, so the reconciler derives local fields through a configurable
//! mapping instead of a fixed schema.

use serde::Serialize;
use serde_json::Value;

/// Reads an identifier that may be a JSON string or number.
///
/// Blank strings, zero and negative numbers (Halo's "unassigned" markers)
/// yield `None`.
#[must_use]
pub fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) if i <= 0 => None,
            _ => Some(n.to_string()),
        },
        _ => None,
    }
}

fn field_id(record: &Value, field: &str) -> Option<String> {
    record.get(field).and_then(value_as_id)
}

/// A Halo client (organization).
#[derive(Debug, Clone, Serialize)]
pub struct RemoteOrganization {
    pub id: String,
    pub record: Value,
}

impl RemoteOrganization {
    /// Returns `None` when the record carries no usable `id`.
    #[must_use]
    pub fn from_json(record: Value) -> Option<Self> {
        let id = field_id(&record, "id")?;
        Some(Self { id, record })
    }
}

/// A Halo user (contact) belonging to a client.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteContact {
    pub id: String,
    /// Owning client id.
    pub organization_id: Option<String>,
    pub record: Value,
}

impl RemoteContact {
    #[must_use]
    pub fn from_json(record: Value) -> Option<Self> {
        let id = field_id(&record, "id")?;
        let organization_id = field_id(&record, "client_id");
        Some(Self {
            id,
            organization_id,
            record,
        })
    }
}

/// A Halo site belonging to a client.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteSite {
    pub id: String,
    /// Owning client id.
    pub organization_id: Option<String>,
    pub record: Value,
}

impl RemoteSite {
    #[must_use]
    pub fn from_json(record: Value) -> Option<Self> {
        let id = field_id(&record, "id")?;
        let organization_id = field_id(&record, "client_id");
        Some(Self {
            id,
            organization_id,
            record,
        })
    }
}
