//! PIN submission policy and encryption
//!
//! Every PIN-bearing card operation goes through [`PinPolicyEnforcer::check`]
//! before anything is sent to the agent. Disallowed combinations are
//! rejected locally; accepted plaintext PINs are replaced by their RSA
//! encryption under the key the agent trusts.

mod crypto;
mod policy;

pub use crypto::{encrypt_pin, parse_public_key};
pub use policy::{PinPolicy, PolicyViolation};

use std::fmt;

use cardgate_transport::TransportError;
use serde::Serialize;
use tracing::{debug, instrument};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::agent::AgentClient;
use crate::context::TrustedKeys;
use crate::{Error, Result};

/// Errors raised while checking a PIN submission
#[derive(Debug, thiserror::Error)]
pub enum PinError {
    #[error("{0}")]
    Violation(PolicyViolation),

    /// The reader could not be looked up
    #[error("Failed to read reader capabilities: {0}")]
    Reader(#[source] TransportError),

    #[error("No trusted key available to encrypt the PIN")]
    NoKey,

    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    #[error("PIN encryption failed: {0}")]
    Encryption(String),
}

impl PinError {
    pub fn code(&self) -> String {
        match self {
            Self::Violation(violation) => violation.code().to_string(),
            Self::Reader(error) => error.code(),
            Self::NoKey | Self::InvalidKey(_) | Self::Encryption(_) => "610".to_string(),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::Violation(_) => 400,
            Self::Reader(error) => error.status(),
            Self::NoKey | Self::InvalidKey(_) | Self::Encryption(_) => 500,
        }
    }
}

impl From<PolicyViolation> for PinError {
    fn from(violation: PolicyViolation) -> Self {
        Self::Violation(violation)
    }
}

/// Plaintext PIN, wiped from memory on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Pin(String);

impl Pin {
    pub fn new(pin: impl Into<String>) -> Self {
        Self(pin.into())
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(***)")
    }
}

/// A PIN submission as requested by the caller
#[derive(Debug, Clone, Default)]
pub struct PinRequest {
    pin: Option<Pin>,
    os_dialog: bool,
}

impl PinRequest {
    /// Submission without a PIN, for readers with a pinpad or an OS dialog
    pub fn without_pin() -> Self {
        Self::default()
    }

    /// Submission carrying a PIN; an empty PIN counts as none
    pub fn with_pin(pin: impl Into<String>) -> Self {
        let pin = Pin::new(pin);
        Self {
            pin: (!pin.is_empty()).then_some(pin),
            os_dialog: false,
        }
    }

    /// Ask the agent to show the OS PIN dialog
    pub const fn with_os_dialog(mut self, os_dialog: bool) -> Self {
        self.os_dialog = os_dialog;
        self
    }

    pub const fn has_pin(&self) -> bool {
        self.pin.is_some()
    }
}

/// A submission that passed the policy; `pin` only ever holds ciphertext
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct CheckedPinRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pin: Option<String>,
    pinpad: bool,
    os_dialog: bool,
}

impl CheckedPinRequest {
    /// Base64 RSA ciphertext of the PIN
    pub fn encrypted_pin(&self) -> Option<&str> {
        self.pin.as_deref()
    }

    pub const fn pinpad(&self) -> bool {
        self.pinpad
    }

    pub const fn os_dialog(&self) -> bool {
        self.os_dialog
    }
}

impl fmt::Debug for CheckedPinRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckedPinRequest")
            .field("has_pin", &self.pin.is_some())
            .field("pinpad", &self.pinpad)
            .field("os_dialog", &self.os_dialog)
            .finish()
    }
}

/// Applies the PIN policy and encrypts accepted PINs
#[derive(Debug, Clone)]
pub struct PinPolicyEnforcer {
    agent: AgentClient,
    keys: Option<TrustedKeys>,
    policy: PinPolicy,
    os_pin_dialog: bool,
}

impl PinPolicyEnforcer {
    pub const fn new(agent: AgentClient, keys: Option<TrustedKeys>, policy: PinPolicy) -> Self {
        Self {
            agent,
            keys,
            policy,
            os_pin_dialog: false,
        }
    }

    /// Treat every request as if the OS PIN dialog were enabled
    pub const fn with_os_pin_dialog(mut self, enabled: bool) -> Self {
        self.os_pin_dialog = enabled;
        self
    }

    /// Check a submission against the policy and encrypt its PIN
    #[instrument(skip(self, request), fields(has_pin = request.has_pin()))]
    pub async fn check(&self, reader_id: &str, request: PinRequest) -> Result<CheckedPinRequest> {
        let os_dialog = request.os_dialog || self.os_pin_dialog;
        let pinpad = self.evaluate(reader_id, request.has_pin(), os_dialog).await?;

        let pin = match &request.pin {
            Some(pin) => Some(self.encrypt(pin)?),
            None => None,
        };
        Ok(CheckedPinRequest {
            pin,
            pinpad,
            os_dialog,
        })
    }

    /// Check a submission whose PIN, if any, is already encrypted
    pub async fn check_encrypted(&self, reader_id: &str, has_pin: bool) -> Result<()> {
        self.evaluate(reader_id, has_pin, self.os_pin_dialog).await?;
        Ok(())
    }

    /// Evaluate the policy for the reader, returning its pinpad flag
    async fn evaluate(&self, reader_id: &str, has_pin: bool, os_dialog: bool) -> Result<bool> {
        let reader = self.agent.reader(reader_id).await.map_err(|error| match error {
            Error::Transport(source) => PinError::Reader(source).into(),
            other => other,
        })?;
        debug!(reader = reader_id, pinpad = reader.pinpad, "evaluating pin policy");

        self.policy
            .evaluate(reader.pinpad, has_pin, os_dialog)
            .map_err(PinError::from)?;
        Ok(reader.pinpad)
    }

    fn encrypt(&self, pin: &Pin) -> Result<String> {
        let keys = self.keys.as_ref().ok_or(PinError::NoKey)?;
        let key = parse_public_key(keys.encryption_key())?;
        Ok(encrypt_pin(&key, pin.as_bytes())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, agent_ok, test_key, test_public_pem};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use cardgate_transport::Endpoint;
    use rsa::Pkcs1v15Encrypt;
    use serde_json::json;

    fn setup(force: bool, keys: Option<TrustedKeys>) -> (ScriptedTransport, PinPolicyEnforcer) {
        let transport = ScriptedTransport::new()
            .on_get(Endpoint::Agent, "/card-readers/123", Ok(agent_ok(json!({ "pinpad": true }))))
            .on_get(Endpoint::Agent, "/card-readers/321", Ok(agent_ok(json!({ "pinpad": false }))));
        let agent = AgentClient::new(transport.shared());
        (transport, PinPolicyEnforcer::new(agent, keys, PinPolicy::new(force)))
    }

    fn keys() -> Option<TrustedKeys> {
        Some(TrustedKeys::new(test_public_pem()))
    }

    #[tokio::test]
    async fn test_relaxed_policy_encrypts_pin() {
        let (_, enforcer) = setup(false, keys());

        let checked = enforcer.check("123", PinRequest::with_pin("1234")).await.unwrap();
        assert!(checked.pinpad());

        let ciphertext = STANDARD.decode(checked.encrypted_pin().unwrap()).unwrap();
        let plaintext = test_key().decrypt(Pkcs1v15Encrypt, &ciphertext).unwrap();
        assert_eq!(plaintext, b"1234");
    }

    #[tokio::test]
    async fn test_pin_with_pinpad_is_rejected() {
        let (transport, enforcer) = setup(true, keys());

        let error = enforcer.check("123", PinRequest::with_pin("1234")).await.unwrap_err();
        assert_eq!(error.code(), "600");
        assert_eq!(error.status(), 400);
        assert_eq!(
            error.description(),
            "Strict pinpad enforcement is enabled. This request was sent with a PIN, but the reader has a pinpad."
        );
        // Only the reader lookup reached the agent.
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_pin_without_pinpad_is_rejected() {
        let (_, enforcer) = setup(true, keys());

        let error = enforcer.check("321", PinRequest::without_pin()).await.unwrap_err();
        assert_eq!(error.code(), "601");

        let accepted = enforcer
            .check("321", PinRequest::without_pin().with_os_dialog(true))
            .await
            .unwrap();
        assert!(accepted.os_dialog());
        assert_eq!(accepted.encrypted_pin(), None);
    }

    #[tokio::test]
    async fn test_configured_os_dialog_applies() {
        let (_, enforcer) = setup(true, keys());
        let enforcer = enforcer.with_os_pin_dialog(true);

        let checked = enforcer.check("321", PinRequest::without_pin()).await.unwrap();
        assert!(checked.os_dialog());
        enforcer.check_encrypted("321", false).await.unwrap();
    }

    #[tokio::test]
    async fn test_strict_policy_accepts_allowed_combinations() {
        let (_, enforcer) = setup(true, keys());

        let pinpad = enforcer.check("123", PinRequest::without_pin()).await.unwrap();
        assert!(pinpad.pinpad());

        let typed = enforcer.check("321", PinRequest::with_pin("1234")).await.unwrap();
        assert!(typed.encrypted_pin().is_some());

        assert_eq!(
            enforcer.check_encrypted("123", true).await.unwrap_err().code(),
            "600"
        );
    }

    #[tokio::test]
    async fn test_encryption_failure_is_local_to_the_operation() {
        let (_, without_key) = setup(false, None);
        let error = without_key.check("123", PinRequest::with_pin("1234")).await.unwrap_err();
        assert_eq!(error.code(), "610");

        let (_, bad_key) = setup(false, Some(TrustedKeys::new("bm90IGEga2V5")));
        let error = bad_key.check("123", PinRequest::with_pin("1234")).await.unwrap_err();
        assert_eq!(error.code(), "610");

        let (_, no_pin) = setup(false, None);
        assert!(no_pin.check("123", PinRequest::without_pin()).await.is_ok());
    }

    #[test]
    fn test_pin_is_redacted() {
        let request = PinRequest::with_pin("987654");
        assert!(!format!("{request:?}").contains("987654"));
        assert!(!PinRequest::with_pin("").has_pin());
    }

    #[test]
    fn test_checked_request_body() {
        let checked = CheckedPinRequest {
            pin: None,
            pinpad: true,
            os_dialog: false,
        };
        assert_eq!(
            serde_json::to_value(&checked).unwrap(),
            json!({ "pinpad": true, "os_dialog": false })
        );
    }
}
