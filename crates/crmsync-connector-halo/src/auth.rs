//! OAuth2 client credentials exchange against the Halo authorization server.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{HaloConfig, HaloCredentials, HaloError, HaloResult};

/// Scope requested for the directory read.
const TOKEN_SCOPE: &str = "all";

/// Token response from the Halo authorization server.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Bearer token for the resource server.
#[derive(Debug)]
pub struct AccessToken {
    value: SecretString,
    expires_in: Option<i64>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: SecretString::from(value.into()),
            expires_in: None,
        }
    }

    /// Lifetime announced by the server, in seconds.
    #[must_use]
    pub fn expires_in(&self) -> Option<i64> {
        self.expires_in
    }

    pub(crate) fn secret(&self) -> &str {
        self.value.expose_secret()
    }
}

/// Performs the client credentials exchange.
#[instrument(skip(http_client, config, credentials), fields(tenant = ?config.tenant))]
pub(crate) async fn request_token(
    http_client: &reqwest::Client,
    config: &HaloConfig,
    credentials: &HaloCredentials,
) -> HaloResult<AccessToken> {
    let token_url = config.token_url();

    let params = [
        ("grant_type", "client_credentials"),
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.expose_secret()),
        ("scope", TOKEN_SCOPE),
    ];

    let response = http_client
        .post(&token_url)
        .form(&params)
        .send()
        .await
        .map_err(|e| HaloError::network(&token_url, e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| HaloError::network(&token_url, e))?;

    if !status.is_success() {
        return Err(HaloError::authentication(&token_url, status.as_u16(), body));
    }

    let token_response: TokenResponse = serde_json::from_str(&body).map_err(|e| {
        HaloError::authentication(
            &token_url,
            status.as_u16(),
            format!("Failed to parse token response: {e}"),
        )
    })?;

    let access_token = token_response
        .access_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            HaloError::authentication(
                &token_url,
                status.as_u16(),
                "Token response did not contain an access_token",
            )
        })?;

    debug!(expires_in = ?token_response.expires_in, "Acquired Halo access token");

    Ok(AccessToken {
        value: SecretString::from(access_token),
        expires_in: token_response.expires_in,
    })
}
