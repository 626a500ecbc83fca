//! Service configuration loaded from environment variables.
//!
//! Halo credentials are optional at startup: a missing value surfaces as a
//! 400 when a sync is triggered, so the status endpoint can still report
//! `configured: false`.

use std::env::VarError;
use std::net::SocketAddr;
use std::time::Duration;

use crmsync_api_directory::HaloEnvSettings;
use crmsync_reconcile::WriteOptions;
use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOG_FILTER: &str = "info,crmsync=debug";

/// Configuration errors that can occur during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

impl ConfigError {
    fn invalid(var: &str, message: impl ToString) -> Self {
        Self::InvalidValue {
            var: var.to_string(),
            message: message.to_string(),
        }
    }
}

/// Connection details for the hosted record store.
#[derive(Debug)]
pub struct StoreConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub timeout: Duration,
}

/// Full service configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub log_filter: String,
    pub halo: HaloEnvSettings,
    /// `None` selects the in-memory store.
    pub store: Option<StoreConfig>,
    pub write_options: WriteOptions,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let optional = |key: &str| {
            reader(key)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let host = optional("SYNC_API_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match optional("SYNC_API_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| ConfigError::invalid("SYNC_API_PORT", e))?,
            None => DEFAULT_PORT,
        };

        let halo = HaloEnvSettings {
            client_id: optional("HALO_CLIENT_ID"),
            client_secret: optional("HALO_CLIENT_SECRET").map(SecretString::from),
            tenant: optional("HALO_TENANT"),
            auth_url: optional("HALO_AUTH_URL"),
            api_url: optional("HALO_API_URL"),
            excluded_client_ids: optional("HALO_EXCLUDED_CLIENT_IDS").unwrap_or_default(),
        };

        let store = match optional("CRM_STORE_URL") {
            Some(base_url) => {
                let api_key = optional("CRM_STORE_API_KEY")
                    .ok_or_else(|| ConfigError::MissingVar("CRM_STORE_API_KEY".into()))?;
                let timeout_secs = match optional("CRM_STORE_TIMEOUT_SECS") {
                    Some(raw) => raw
                        .parse::<u64>()
                        .map_err(|e| ConfigError::invalid("CRM_STORE_TIMEOUT_SECS", e))?,
                    None => DEFAULT_STORE_TIMEOUT_SECS,
                };
                Some(StoreConfig {
                    base_url,
                    api_key: SecretString::from(api_key),
                    timeout: Duration::from_secs(timeout_secs),
                })
            }
            None => None,
        };

        let defaults = WriteOptions::default();
        let write_options = WriteOptions {
            update_group_size: positive(
                "SYNC_UPDATE_GROUP_SIZE",
                optional("SYNC_UPDATE_GROUP_SIZE"),
                defaults.update_group_size,
            )?,
            create_batch_size: positive(
                "SYNC_CREATE_BATCH_SIZE",
                optional("SYNC_CREATE_BATCH_SIZE"),
                defaults.create_batch_size,
            )?,
        };

        Ok(Self {
            host,
            port,
            log_filter: optional("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            halo,
            store,
            write_options,
        })
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::invalid("SYNC_API_HOST", e))
    }
}

fn positive(var: &str, raw: Option<String>, default: usize) -> Result<usize, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.parse::<usize>() {
        Ok(0) => Err(ConfigError::invalid(var, "must be greater than zero")),
        Ok(value) => Ok(value),
        Err(e) => Err(ConfigError::invalid(var, e)),
    }
}
