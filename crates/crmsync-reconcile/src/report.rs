//! Run summary.

use chrono::{DateTime, Utc};

use crate::error::WriteError;

/// Per-entity counters.
///
/// `matched` counts records linked by email or name this run; they are also
/// counted in `updated`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityCounts {
    pub created: usize,
    pub updated: usize,
    pub matched: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl EntityCounts {
    /// Records written this run.
    #[must_use]
    pub fn written(&self) -> usize {
        self.created + self.updated
    }

    fn breakdown(&self) -> String {
        let mut parts = vec![
            format!("{} created", self.created),
            format!("{} updated", self.updated),
        ];
        if self.matched > 0 {
            parts.push(format!("{} matched", self.matched));
        }
        if self.skipped > 0 {
            parts.push(format!("{} skipped", self.skipped));
        }
        if self.failed > 0 {
            parts.push(format!("{} failed", self.failed));
        }
        parts.join(", ")
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub organizations: EntityCounts,
    pub contacts: EntityCounts,
    pub sites: EntityCounts,
    /// Organizations returned by the remote, before exclusions.
    pub total_organizations: usize,
    pub excluded_organizations: usize,
    /// Phases that were degraded.
    pub warnings: Vec<String>,
    pub failures: Vec<WriteError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set when the settings record was stamped.
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            organizations: EntityCounts::default(),
            contacts: EntityCounts::default(),
            sites: EntityCounts::default(),
            total_organizations: 0,
            excluded_organizations: 0,
            warnings: Vec::new(),
            failures: Vec::new(),
            started_at,
            finished_at: None,
            last_sync_at: None,
        }
    }

    /// Operator-facing summary line.
    #[must_use]
    pub fn message(&self) -> String {
        let mut message = format!(
            "Synced {} organizations ({}), {} contacts ({}), {} sites ({})",
            self.organizations.written(),
            self.organizations.breakdown(),
            self.contacts.written(),
            self.contacts.breakdown(),
            self.sites.written(),
            self.sites.breakdown(),
        );
        if self.excluded_organizations > 0 {
            message.push_str(&format!(
                "; {} organizations excluded",
                self.excluded_organizations
            ));
        }
        if !self.warnings.is_empty() {
            message.push_str(&format!("; warnings: {}", self.warnings.join("; ")));
        }
        message
    }

    /// Duration in milliseconds, once finished.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message() {
        let mut report = SyncReport::new(Utc::now());
        report.organizations = EntityCounts {
            created: 1,
            updated: 2,
            matched: 1,
            ..Default::default()
        };
        report.contacts = EntityCounts {
            created: 4,
            skipped: 2,
            ..Default::default()
        };

        assert_eq!(
            report.message(),
            "Synced 3 organizations (1 created, 2 updated, 1 matched), \
             4 contacts (4 created, 0 updated, 2 skipped), \
             0 sites (0 created, 0 updated)"
        );
    }

    #[test]
    fn test_message_mentions_warnings_and_exclusions() {
        let mut report = SyncReport::new(Utc::now());
        report.excluded_organizations = 2;
        report.warnings.push("Contacts not synced: HTTP 500".into());

        let message = report.message();
        assert!(message.contains("2 organizations excluded"));
        assert!(message.contains("Contacts not synced"));
        assert!(report.duration_ms().is_none());
    }
}
