//! HaloPSA directory client for crmsync
//!
//! This crate talks to the HaloPSA REST API on behalf of the reconciliation
//! engine. It only reads: organizations (`/api/Client`), their contacts
//! (`/api/Users`) and their physical sites (`/api/Site`).
//!
//! # Features
//!
//! - `OAuth2` client credentials authentication, optionally tenant scoped
//! - Base URL normalization (`https://x.halopsa.com/api/` and
//!   `https://x.halopsa.com` address the same instance)
//! - Bounded single-page fetches with error classification
//! - Exclusion filtering of organizations by remote id
//!
//! # Example
//!
//! ```no_run
//! use crmsync_connector_halo::{HaloClient, HaloConfig, HaloCredentials};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HaloConfig::builder()
//!     .auth_url("https://acme.halopsa.com/auth")
//!     .api_url("https://acme.halopsa.com/api")
//!     .build()?;
//!
//! let credentials = HaloCredentials::new("client-id", "client-secret");
//!
//! let client = HaloClient::new(config, credentials)?;
//! let token = client.authenticate().await?;
//! let organizations = client.fetch_organizations(&token).await?;
//! println!("{} organizations", organizations.len());
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod config;
mod error;
mod models;

// Re-exports
pub use auth::AccessToken;
pub use client::{exclude_organizations, parse_excluded_ids, HaloClient};
pub use config::{
    normalize_base_url, HaloConfig, HaloConfigBuilder, HaloCredentials,
    DEFAULT_CONTACT_PAGE_SIZE, DEFAULT_ORGANIZATION_PAGE_SIZE, DEFAULT_SITE_PAGE_SIZE,
};
pub use error::{HaloError, HaloResult};
pub use models::{value_as_id, RemoteContact, RemoteOrganization, RemoteSite};
