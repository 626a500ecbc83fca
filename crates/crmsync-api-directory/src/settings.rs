//! Halo connection settings from the environment, overlaid with the stored
//! integration-settings record.

use std::collections::HashSet;

use crmsync_connector_halo::{
    parse_excluded_ids, HaloConfig, HaloCredentials, HaloResult,
};
use crmsync_reconcile::IntegrationSettings;
use secrecy::{ExposeSecret, SecretString};

/// Settings supplied by the process environment.
#[derive(Debug, Default)]
pub struct HaloEnvSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub tenant: Option<String>,
    pub auth_url: Option<String>,
    pub api_url: Option<String>,
    /// Comma separated remote organization ids.
    pub excluded_client_ids: String,
}

/// Stored value when non-blank, else the environment value when non-blank.
fn prefer<'a>(stored: Option<&'a str>, env: Option<&'a str>) -> Option<&'a str> {
    let non_blank = |v: &&str| !v.trim().is_empty();
    stored.filter(non_blank).or(env.filter(non_blank))
}

impl HaloEnvSettings {
    /// Client credentials. These come from the environment only.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when either value is missing.
    pub fn credentials(&self) -> HaloResult<HaloCredentials> {
        let credentials = HaloCredentials::new(
            self.client_id.clone().unwrap_or_default(),
            self.client_secret
                .as_ref()
                .map(|s| s.expose_secret().to_string())
                .unwrap_or_default(),
        );
        credentials.validate()?;
        Ok(credentials)
    }

    /// Builds the connection settings for one run.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a base URL or either credential is
    /// missing.
    pub fn resolve(
        &self,
        stored: Option<&IntegrationSettings>,
    ) -> HaloResult<(HaloConfig, HaloCredentials)> {
        let credentials = self.credentials()?;

        let tenant = prefer(
            stored.and_then(|s| s.tenant.as_deref()),
            self.tenant.as_deref(),
        );
        let mut builder = HaloConfig::builder().tenant(tenant.map(str::to_string));
        if let Some(url) = prefer(
            stored.and_then(|s| s.auth_url.as_deref()),
            self.auth_url.as_deref(),
        ) {
            builder = builder.auth_url(url);
        }
        if let Some(url) = prefer(
            stored.and_then(|s| s.api_url.as_deref()),
            self.api_url.as_deref(),
        ) {
            builder = builder.api_url(url);
        }

        Ok((builder.build()?, credentials))
    }

    /// Remote organization ids to leave out of a run.
    #[must_use]
    pub fn excluded_ids(&self, stored: Option<&IntegrationSettings>) -> HashSet<String> {
        prefer(
            stored.and_then(|s| s.excluded_client_ids.as_deref()),
            Some(self.excluded_client_ids.as_str()),
        )
        .map(parse_excluded_ids)
        .unwrap_or_default()
    }

    #[must_use]
    pub fn is_configured(&self, stored: Option<&IntegrationSettings>) -> bool {
        self.resolve(stored).is_ok()
    }
}
