//! Security context shared by the orchestrator components

use std::fmt;

use crate::types::CapabilityToken;

/// Keys the agent trusts, as confirmed during bootstrap
#[derive(Clone, PartialEq, Eq)]
pub struct TrustedKeys {
    /// Key issued by the distribution service and pushed to the agent
    pub public_key: String,
    /// Device key reported by agents with a container subsystem
    pub device_key: Option<String>,
}

impl TrustedKeys {
    /// Keys consisting of the key the agent was bootstrapped with
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            device_key: None,
        }
    }

    /// Record the device key, ignoring blank values
    pub fn with_device_key(mut self, device_key: Option<String>) -> Self {
        self.device_key = device_key.filter(|key| !key.trim().is_empty());
        self
    }

    /// Key used to encrypt PINs before they leave the host
    pub fn encryption_key(&self) -> &str {
        self.device_key.as_deref().unwrap_or(&self.public_key)
    }
}

impl fmt::Debug for TrustedKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustedKeys")
            .field("public_key_len", &self.public_key.len())
            .field("has_device_key", &self.device_key.is_some())
            .finish()
    }
}

/// Keys and capability token of the current session
///
/// Owned by the [`Client`](crate::Client); components receive it by
/// reference for the duration of a single operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityContext {
    keys: Option<TrustedKeys>,
    token: Option<CapabilityToken>,
}

impl SecurityContext {
    /// Keys confirmed during bootstrap
    pub const fn keys(&self) -> Option<&TrustedKeys> {
        self.keys.as_ref()
    }

    /// Current capability token
    pub const fn token(&self) -> Option<&CapabilityToken> {
        self.token.as_ref()
    }

    /// The raw token, for use as a bearer credential
    pub fn bearer(&self) -> Option<&str> {
        self.token.as_ref().map(CapabilityToken::as_str)
    }

    pub(crate) fn set_keys(&mut self, keys: TrustedKeys) {
        self.keys = Some(keys);
    }

    /// Replace the token, returning the previous one
    pub(crate) fn replace_token(&mut self, token: CapabilityToken) -> Option<CapabilityToken> {
        self.token.replace(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_key_preferred_for_encryption() {
        let keys = TrustedKeys::new("public");
        assert_eq!(keys.encryption_key(), "public");

        let keys = keys.with_device_key(Some("device".into()));
        assert_eq!(keys.encryption_key(), "device");

        let keys = TrustedKeys::new("public").with_device_key(Some("  ".into()));
        assert_eq!(keys.encryption_key(), "public");
    }

    #[test]
    fn test_debug_hides_keys() {
        let keys = TrustedKeys::new("MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEA");
        assert!(!format!("{keys:?}").contains("MIIB"));
    }
}
