//! Run-scoped link from remote organization ids to local customers.

use std::collections::HashMap;

/// The local record a remote organization was written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    pub local_id: String,
    pub local_name: String,
}

/// Remote organization id → local identity, filled as organization batches
/// complete and read by the contact and site phases.
#[derive(Debug, Clone, Default)]
pub struct RemoteIdentityMap {
    entries: HashMap<String, LocalIdentity>,
}

impl RemoteIdentityMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        remote_id: impl Into<String>,
        local_id: impl Into<String>,
        local_name: impl Into<String>,
    ) {
        self.entries.insert(
            remote_id.into(),
            LocalIdentity {
                local_id: local_id.into(),
                local_name: local_name.into(),
            },
        );
    }

    #[must_use]
    pub fn get(&self, remote_id: &str) -> Option<&LocalIdentity> {
        self.entries.get(remote_id)
    }

    /// Parent lookup for a contact or site.
    #[must_use]
    pub fn parent_of(&self, organization_id: Option<&str>) -> Option<&LocalIdentity> {
        organization_id.and_then(|id| self.get(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
