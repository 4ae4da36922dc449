//! Capability token decoding
//!
//! The token is issued and signed by the distribution service. The client
//! only needs its claims, so the signature is not verified here; the agent
//! verifies it when the token is presented on its admin API.

use std::collections::BTreeSet;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;

/// Failure to read a capability token
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("No capability token available")]
    Missing,

    #[error("Capability token could not be decoded: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

impl TokenError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Missing => "901",
            Self::Invalid(_) => "902",
        }
    }
}

/// Entry of the `plugins`/`containers` claim
///
/// Issuers have used both bare names and `{name, version}` objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RequiredEntry {
    Name(String),
    Descriptor {
        name: String,
        #[allow(dead_code)]
        #[serde(default)]
        version: Option<String>,
    },
}

impl RequiredEntry {
    fn into_name(self) -> String {
        match self {
            Self::Name(name) | Self::Descriptor { name, .. } => name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CapabilityClaims {
    #[serde(default)]
    plugins: Option<Vec<RequiredEntry>>,
    /// Claim name used by older issuers
    #[serde(default)]
    containers: Option<Vec<RequiredEntry>>,
    #[serde(default)]
    iat: Option<u64>,
    #[serde(default)]
    exp: Option<u64>,
}

/// Names of the containers that must be installed before the device is usable
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequiredContainerSet(BTreeSet<String>);

impl RequiredContainerSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RequiredContainerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Signed capability token issued by the distribution service
#[derive(Clone, PartialEq, Eq)]
pub struct CapabilityToken {
    raw: String,
    issued_at: Option<SystemTime>,
    expires_at: Option<SystemTime>,
    required: RequiredContainerSet,
}

impl CapabilityToken {
    /// Decode the claims of a raw token
    pub fn decode(raw: &str) -> Result<Self, TokenError> {
        if raw.trim().is_empty() {
            return Err(TokenError::Missing);
        }

        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<CapabilityClaims>(
            raw,
            &DecodingKey::from_secret(&[]),
            &validation,
        )?;
        let claims = data.claims;
        let entries = claims.plugins.or(claims.containers).unwrap_or_default();

        Ok(Self {
            raw: raw.to_string(),
            issued_at: claims.iat.map(from_unix),
            expires_at: claims.exp.map(from_unix),
            required: RequiredContainerSet::new(entries.into_iter().map(RequiredEntry::into_name)),
        })
    }

    /// The encoded token, as sent on the wire
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub const fn issued_at(&self) -> Option<SystemTime> {
        self.issued_at
    }

    pub const fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
    }

    /// Containers the token requires
    pub const fn required(&self) -> &RequiredContainerSet {
        &self.required
    }

    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

impl fmt::Debug for CapabilityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityToken")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

fn from_unix(seconds: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::token_with_claims;
    use serde_json::json;

    #[test]
    fn test_plugins_claim() {
        let raw = token_with_claims(json!({ "plugins": ["beid", "emv"], "iat": 1_700_000_000, "exp": 1_700_003_600 }));
        let token = CapabilityToken::decode(&raw).unwrap();

        assert_eq!(token.required(), &RequiredContainerSet::new(["beid", "emv"]));
        assert_eq!(token.issued_at(), Some(UNIX_EPOCH + Duration::from_secs(1_700_000_000)));
        assert!(token.is_expired(UNIX_EPOCH + Duration::from_secs(1_700_003_600)));
        assert_eq!(token.as_str(), raw);
    }

    #[test]
    fn test_legacy_containers_claim_with_descriptors() {
        let raw = token_with_claims(json!({
            "containers": [{ "name": "beid", "version": "1.0.0" }, "piv"]
        }));
        let token = CapabilityToken::decode(&raw).unwrap();

        assert!(token.required().contains("beid"));
        assert!(token.required().contains("piv"));
        assert_eq!(token.required().len(), 2);
        assert_eq!(token.expires_at(), None);
    }

    #[test]
    fn test_plugins_claim_wins_over_legacy() {
        let raw = token_with_claims(json!({ "plugins": ["emv"], "containers": ["beid"] }));
        let token = CapabilityToken::decode(&raw).unwrap();
        assert_eq!(token.required(), &RequiredContainerSet::new(["emv"]));
    }

    #[test]
    fn test_missing_and_malformed_tokens() {
        let missing = CapabilityToken::decode("  ").unwrap_err();
        assert!(matches!(missing, TokenError::Missing));
        assert_eq!(missing.code(), "901");

        let invalid = CapabilityToken::decode("not-a-token").unwrap_err();
        assert!(matches!(invalid, TokenError::Invalid(_)));
        assert_eq!(invalid.code(), "902");
    }

    #[test]
    fn test_debug_hides_raw_token() {
        let raw = token_with_claims(json!({ "plugins": [] }));
        let token = CapabilityToken::decode(&raw).unwrap();
        assert!(!format!("{token:?}").contains(&raw));
    }
}
