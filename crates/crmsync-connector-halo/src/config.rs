//! Connection settings and credentials for a HaloPSA instance.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;

use crate::{HaloError, HaloResult};

/// Organizations requested per run.
pub const DEFAULT_ORGANIZATION_PAGE_SIZE: usize = 500;
/// Contacts requested per run.
pub const DEFAULT_CONTACT_PAGE_SIZE: usize = 1000;
/// Sites requested per run.
pub const DEFAULT_SITE_PAGE_SIZE: usize = 1000;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Normalizes a configured base URL.
///
/// Trailing slashes and a literal `/auth` or `/api` suffix are removed, so
/// operators may paste either the instance root or the endpoint root.
#[must_use]
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let stripped = trimmed
        .strip_suffix("/auth")
        .or_else(|| trimmed.strip_suffix("/api"))
        .unwrap_or(trimmed);
    stripped.trim_end_matches('/').to_string()
}

/// OAuth2 client credentials for the Halo API application.
#[derive(Debug)]
pub struct HaloCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl HaloCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
        }
    }

    /// Fails when either half of the credential pair is blank.
    pub fn validate(&self) -> HaloResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(HaloError::configuration("Halo client id is not configured"));
        }
        if self.client_secret.expose_secret().trim().is_empty() {
            return Err(HaloError::configuration(
                "Halo client secret is not configured",
            ));
        }
        Ok(())
    }
}

/// Validated connection settings.
#[derive(Debug, Clone)]
pub struct HaloConfig {
    /// Authorization server root, normalized.
    pub auth_url: String,
    /// Resource server root, normalized.
    pub api_url: String,
    /// Tenant discriminator for hosted instances.
    pub tenant: Option<String>,
    pub organization_page_size: usize,
    pub contact_page_size: usize,
    pub site_page_size: usize,
    pub request_timeout: Duration,
}

impl HaloConfig {
    #[must_use]
    pub fn builder() -> HaloConfigBuilder {
        HaloConfigBuilder::default()
    }

    /// Token endpoint, with the tenant query parameter when configured.
    #[must_use]
    pub fn token_url(&self) -> String {
        let base = format!("{}/auth/token", self.auth_url);
        match self.tenant.as_deref() {
            Some(tenant) => match Url::parse_with_params(&base, &[("tenant", tenant)]) {
                Ok(url) => url.to_string(),
                Err(_) => base,
            },
            None => base,
        }
    }

    /// Resource endpoint for a collection, e.g. `Client`.
    #[must_use]
    pub fn resource_url(&self, resource: &str, count: usize) -> String {
        format!("{}/api/{}?count={}", self.api_url, resource, count)
    }
}

/// Builder for [`HaloConfig`].
#[derive(Debug, Default)]
pub struct HaloConfigBuilder {
    auth_url: Option<String>,
    api_url: Option<String>,
    tenant: Option<String>,
    organization_page_size: Option<usize>,
    contact_page_size: Option<usize>,
    site_page_size: Option<usize>,
    request_timeout: Option<Duration>,
}

impl HaloConfigBuilder {
    #[must_use]
    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Blank tenants are treated as absent.
    #[must_use]
    pub fn tenant(mut self, tenant: Option<String>) -> Self {
        self.tenant = tenant
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        self
    }

    #[must_use]
    pub fn organization_page_size(mut self, size: usize) -> Self {
        self.organization_page_size = Some(size);
        self
    }

    #[must_use]
    pub fn contact_page_size(mut self, size: usize) -> Self {
        self.contact_page_size = Some(size);
        self
    }

    #[must_use]
    pub fn site_page_size(mut self, size: usize) -> Self {
        self.site_page_size = Some(size);
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Validates and normalizes the settings.
    ///
    /// # Errors
    ///
    /// Returns [`HaloError::Configuration`] when a base URL is missing or is
    /// not an absolute URL.
    pub fn build(self) -> HaloResult<HaloConfig> {
        let auth_url = required_url(self.auth_url, "Halo authorization URL")?;
        let api_url = required_url(self.api_url, "Halo API URL")?;

        Ok(HaloConfig {
            auth_url,
            api_url,
            tenant: self.tenant,
            organization_page_size: self
                .organization_page_size
                .unwrap_or(DEFAULT_ORGANIZATION_PAGE_SIZE),
            contact_page_size: self.contact_page_size.unwrap_or(DEFAULT_CONTACT_PAGE_SIZE),
            site_page_size: self.site_page_size.unwrap_or(DEFAULT_SITE_PAGE_SIZE),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        })
    }
}

fn required_url(raw: Option<String>, label: &str) -> HaloResult<String> {
    let normalized = raw.as_deref().map(normalize_base_url).unwrap_or_default();
    if normalized.is_empty() {
        return Err(HaloError::configuration(format!(
            "{label} is not configured"
        )));
    }
    Url::parse(&normalized)
        .map_err(|e| HaloError::configuration(format!("{label} '{normalized}' is invalid: {e}")))?;
    Ok(normalized)
}
