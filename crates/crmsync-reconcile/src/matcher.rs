//! Identity resolution against already-stored local records.
//!
//! Resolution order is external id, then email, then name; the first hit
//! wins. Only the external id survives renames and email changes, so email
//! and name hits are reported as fallback matches.

use std::collections::HashMap;

/// Trimmed, lower-cased comparison key.
#[must_use]
pub fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Name key for a site, qualified by its owning customer so two customers'
/// "Head Office" sites never match each other.
#[must_use]
pub fn site_name_key(customer_id: &str, name: &str) -> String {
    if name.trim().is_empty() {
        return String::new();
    }
    format!("{}/{}", customer_id, normalize_key(name))
}

/// The remote side of a match.
#[derive(Debug, Clone, Copy)]
pub struct MatchCandidate<'a> {
    pub external_id: &'a str,
    pub email: &'a str,
    pub name: &'a str,
}

/// How a candidate was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    ExternalId(String),
    Email(String),
    Name(String),
    Unmatched,
}

impl MatchOutcome {
    /// Local id of the matched record.
    #[must_use]
    pub fn local_id(&self) -> Option<&str> {
        match self {
            Self::ExternalId(id) | Self::Email(id) | Self::Name(id) => Some(id),
            Self::Unmatched => None,
        }
    }

    /// True when the match did not come from the external id.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Email(_) | Self::Name(_))
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExternalId(_) => "external_id",
            Self::Email(_) => "email",
            Self::Name(_) => "name",
            Self::Unmatched => "unmatched",
        }
    }
}

/// In-memory lookup tables over one local collection.
#[derive(Debug, Default)]
pub struct IdentityIndex {
    by_external_id: HashMap<String, String>,
    by_email: HashMap<String, String>,
    by_name: HashMap<String, String>,
}

impl IdentityIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes a local record. Empty keys are not indexed; on duplicate
    /// keys the first record wins.
    pub fn insert(&mut self, local_id: &str, external_id: Option<&str>, email: &str, name: &str) {
        if let Some(ext) = external_id.map(str::trim).filter(|e| !e.is_empty()) {
            self.by_external_id
                .entry(ext.to_string())
                .or_insert_with(|| local_id.to_string());
        }
        let email = normalize_key(email);
        if !email.is_empty() {
            self.by_email
                .entry(email)
                .or_insert_with(|| local_id.to_string());
        }
        let name = normalize_key(name);
        if !name.is_empty() {
            self.by_name
                .entry(name)
                .or_insert_with(|| local_id.to_string());
        }
    }

    /// Indexes a record that is already linked to a remote record. It stays
    /// reachable by external id only, so a fallback never re-points it.
    pub fn insert_linked(&mut self, local_id: &str, external_id: &str) {
        self.insert(local_id, Some(external_id), "", "");
    }

    /// Resolves a remote record to a local one.
    #[must_use]
    pub fn resolve(&self, candidate: &MatchCandidate<'_>) -> MatchOutcome {
        if let Some(id) = self.by_external_id.get(candidate.external_id.trim()) {
            return MatchOutcome::ExternalId(id.clone());
        }

        let email = normalize_key(candidate.email);
        if !email.is_empty() {
            if let Some(id) = self.by_email.get(&email) {
                return MatchOutcome::Email(id.clone());
            }
        }

        let name = normalize_key(candidate.name);
        if !name.is_empty() {
            if let Some(id) = self.by_name.get(&name) {
                return MatchOutcome::Name(id.clone());
            }
        }

        MatchOutcome::Unmatched
    }

    /// Number of records indexed by external id.
    #[must_use]
    pub fn linked_len(&self) -> usize {
        self.by_external_id.len()
    }
}
