//! Error types for the transport layer

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::request::Endpoint;

/// Structured error reported by the agent or the distribution service
///
/// Every transport failure can be reduced to this shape with
/// [`TransportError::to_rest`], so callers always see a machine-readable
/// code, the HTTP status and a human-readable description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{description} (code {code}, status {status})")]
pub struct RestError {
    /// Machine-readable error code
    #[serde(deserialize_with = "code_from_any")]
    pub code: String,
    /// HTTP status
    #[serde(default)]
    pub status: u16,
    /// Human-readable description
    #[serde(default, alias = "message")]
    pub description: String,
}

impl RestError {
    /// Create a new error
    pub fn new(status: u16, code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            status,
            description: description.into(),
        }
    }

    /// Build an error from a non-success response
    ///
    /// The agent wraps errors as `{success: false, data: {...}}` on some
    /// versions and returns the bare object on others; both are accepted.
    /// Bodies that are not JSON fall back to the status code.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let parsed = serde_json::from_slice::<Value>(body).ok().and_then(|value| {
            let inner = match value.get("data") {
                Some(data) if data.is_object() => data.clone(),
                _ => value,
            };
            serde_json::from_value::<Self>(inner).ok()
        });

        match parsed {
            Some(mut error) => {
                if error.status == 0 {
                    error.status = status;
                }
                error
            }
            None => Self::new(
                status,
                status.to_string(),
                String::from_utf8_lossy(body).trim().to_string(),
            ),
        }
    }
}

fn code_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(code) => Ok(code),
        Value::Number(code) => Ok(code.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unexpected error code {other}"
        ))),
    }
}

/// Errors raised while sending a request
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The remote party answered with a non-success status
    #[error(transparent)]
    Rest(#[from] RestError),

    /// No base URL is configured for the endpoint
    #[error("No base URL configured for the {0}")]
    NotConfigured(Endpoint),

    /// The request could not be delivered or the response could not be read
    #[error("Request to the {endpoint} failed: {source}")]
    Http {
        /// Addressed endpoint
        endpoint: Endpoint,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The URL could not be built
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A body could not be encoded or decoded
    #[error("Malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl TransportError {
    /// HTTP status associated with the error (0 when the request never completed)
    pub fn status(&self) -> u16 {
        match self {
            Self::Rest(error) => error.status,
            Self::Http { source, .. } => source.status().map_or(0, |status| status.as_u16()),
            Self::NotConfigured(_) | Self::Url(_) => 0,
            Self::Payload(_) => 502,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> String {
        match self {
            Self::Rest(error) => error.code.clone(),
            Self::Http { source, .. } if source.is_timeout() => "408".to_string(),
            Self::Http { .. } => "503".to_string(),
            Self::NotConfigured(_) | Self::Url(_) => "400".to_string(),
            Self::Payload(_) => "502".to_string(),
        }
    }

    /// Reduce the error to its structured form
    pub fn to_rest(&self) -> RestError {
        match self {
            Self::Rest(error) => error.clone(),
            other => RestError::new(other.status(), other.code(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_wrapped_agent_error() {
        let body = br#"{"success":false,"data":{"code":301,"description":"Reader not found"}}"#;
        let error = RestError::from_response(404, body);
        assert_eq!(error.code, "301");
        assert_eq!(error.status, 404);
        assert_eq!(error.description, "Reader not found");
    }

    #[test]
    fn test_parses_bare_service_error() {
        let body = br#"{"code":"500","status":412,"message":"No JWT available"}"#;
        let error = RestError::from_response(500, body);
        assert_eq!(error.code, "500");
        assert_eq!(error.status, 412);
        assert_eq!(error.description, "No JWT available");
    }

    #[test]
    fn test_falls_back_to_status_for_plain_bodies() {
        let error = RestError::from_response(503, b"Service Unavailable\n");
        assert_eq!(error.code, "503");
        assert_eq!(error.status, 503);
        assert_eq!(error.description, "Service Unavailable");
    }

    #[test]
    fn test_not_configured_reduces_to_structured_error() {
        let error = TransportError::NotConfigured(Endpoint::Distribution).to_rest();
        assert_eq!(error.code, "400");
        assert!(error.description.contains("distribution service"));
    }
}
