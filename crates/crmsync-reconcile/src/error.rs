//! Sync error types.

use crmsync_connector_halo::HaloError;
use thiserror::Error;

use crate::store::StoreError;

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Authentication or organization fetch failed.
    #[error(transparent)]
    Remote(#[from] HaloError),

    /// The local store could not be read before any work started.
    #[error("Local store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// A record or batch that failed to persist. Collected, never raised.
#[derive(Debug, Clone, Error)]
#[error("Failed to write {target}: {message}")]
pub struct WriteError {
    /// External id of the record, or a batch description.
    pub target: String,
    pub message: String,
}

impl WriteError {
    pub fn new(target: impl Into<String>, source: &StoreError) -> Self {
        Self {
            target: target.into(),
            message: source.to_string(),
        }
    }
}
