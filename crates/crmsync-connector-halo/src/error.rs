//! Error types for the HaloPSA connector.

use serde_json::json;
use thiserror::Error;

/// Result type alias using `HaloError`.
pub type HaloResult<T> = Result<T, HaloError>;

/// Longest remote body kept in an error, in characters.
const MAX_BODY_CHARS: usize = 2_000;

/// Errors that can occur when talking to HaloPSA.
#[derive(Debug, Error)]
pub enum HaloError {
    /// Missing or malformed credentials / base URLs.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The endpoint could not be reached at all.
    #[error("Network error calling {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The token exchange was rejected or returned no usable token.
    #[error("Authentication failed ({status}) at {url}: {body}")]
    Authentication {
        url: String,
        status: u16,
        body: String,
    },

    /// A data endpoint answered with a non-success status.
    #[error("Halo API error {status} from {url}")]
    RemoteApi {
        url: String,
        status: u16,
        body: String,
    },

    /// A data endpoint answered 2xx with a body we could not read.
    #[error("Invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },
}

impl HaloError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn network(url: &str, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.to_string(),
            source,
        }
    }

    pub(crate) fn authentication(url: &str, status: u16, body: impl Into<String>) -> Self {
        Self::Authentication {
            url: url.to_string(),
            status,
            body: truncate_body(body.into()),
        }
    }

    pub(crate) fn remote_api(url: &str, status: u16, body: impl Into<String>) -> Self {
        Self::RemoteApi {
            url: url.to_string(),
            status,
            body: truncate_body(body.into()),
        }
    }

    pub(crate) fn invalid_response(url: &str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            url: url.to_string(),
            message: message.into(),
        }
    }

    /// True for missing credentials / URLs.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// True when the remote rejected the credentials.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// The URL that was being called, if any.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Configuration(_) => None,
            Self::Network { url, .. }
            | Self::Authentication { url, .. }
            | Self::RemoteApi { url, .. }
            | Self::InvalidResponse { url, .. } => Some(url),
        }
    }

    /// The remote HTTP status, if one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::RemoteApi { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Operator-facing detail: attempted URL, remote status and body.
    #[must_use]
    pub fn details(&self) -> serde_json::Value {
        match self {
            Self::Configuration(message) => json!({ "message": message }),
            Self::Network { url, source } => json!({
                "url": url,
                "message": source.to_string(),
            }),
            Self::Authentication { url, status, body } | Self::RemoteApi { url, status, body } => {
                json!({
                    "url": url,
                    "status": status,
                    "body": body,
                })
            }
            Self::InvalidResponse { url, message } => json!({
                "url": url,
                "message": message,
            }),
        }
    }
}

fn truncate_body(body: String) -> String {
    if body.chars().count() <= MAX_BODY_CHARS {
        return body;
    }
    let mut truncated: String = body.chars().take(MAX_BODY_CHARS).collect();
    truncated.push_str("...");
    truncated
}
