//! # Directory Reconciliation
//!
//! Pulls organizations, contacts and sites from HaloPSA and reconciles them
//! into the CRM's customer and site collections.
//!
//! ## Run Flow
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Authenticate │──►│ Organizations│──►│   Contacts   │──►│    Sites     │
//! │              │   │ (fatal)      │   │ (degrading)  │   │ (degrading)  │
//! └──────────────┘   └──────┬───────┘   └──────▲───────┘   └──────▲───────┘
//!                           │ remote id → local identity          │
//!                           └──────────────────┴──────────────────┘
//! ```
//!
//! Each phase derives local fields ([`mapper`]), resolves identity against
//! the existing records ([`matcher`]), and writes update groups followed by
//! bulk-create batches ([`batch`]). Organization writes populate the
//! [`RemoteIdentityMap`] that contacts and sites use to find their parent.
//!
//! ## Example
//!
//! ```ignore
//! use crmsync_reconcile::{InMemoryStore, SyncEngine, SyncRequest};
//!
//! let engine = SyncEngine::new(Arc::new(InMemoryStore::new()));
//! let outcome = engine.run(&halo_client, &SyncRequest::default()).await?;
//! ```

pub mod batch;
pub mod engine;
pub mod error;
pub mod identity_map;
pub mod mapper;
pub mod matcher;
pub mod models;
pub mod report;
pub mod source;
pub mod store;

// Re-exports for convenience
pub use batch::{BatchTally, WriteOptions, DEFAULT_CREATE_BATCH_SIZE, DEFAULT_UPDATE_GROUP_SIZE};
pub use engine::{ConnectionSample, SyncEngine, SyncOutcome, SyncRequest};
pub use error::{SyncError, SyncResult, WriteError};
pub use identity_map::{LocalIdentity, RemoteIdentityMap};
pub use mapper::{FieldDeriver, FieldMapping};
pub use matcher::{IdentityIndex, MatchCandidate, MatchOutcome};
pub use models::{
    CustomerFields, CustomerFilter, IntegrationSettings, LocalCustomer, LocalSite, SettingsPatch,
    SiteFields, SOURCE_TAG,
};
pub use report::{EntityCounts, SyncReport};
pub use source::DirectorySource;
pub use store::{InMemoryStore, RecordStore, RestRecordStore, StoreError, StoreResult};
