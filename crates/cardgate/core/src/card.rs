//! Card capability model and the PIN-bearing card operations

use cardgate_transport::{Endpoint, Request};
use derive_more::Display;
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use crate::agent::{self, AgentClient};
use crate::pin::{CheckedPinRequest, PinPolicyEnforcer, PinRequest};
use crate::{Error, Result};

/// Something a card type can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CardCapability {
    #[display("certificates")]
    Certificates,
    #[display("PIN verification")]
    Pin,
    #[display("biometric data")]
    Biometric,
    #[display("data reading")]
    Data,
    #[display("signing")]
    Signing,
    #[display("authentication")]
    Authentication,
}

/// Card types served by agent plugins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CardKind {
    #[display("Belgian eID")]
    BeId,
    #[display("Luxembourg eID")]
    LuxId,
    #[display("Spanish DNIe")]
    Dnie,
    #[display("EMV")]
    Emv,
    #[display("PIV")]
    Piv,
    #[display("OCRA")]
    Ocra,
    #[display("Aventra")]
    Aventra,
    #[display("Oberthur")]
    Oberthur,
    #[display("PKCS#11")]
    Pkcs11,
}

impl CardKind {
    /// Path segment of the plugin serving this card type
    pub const fn plugin(&self) -> &'static str {
        match self {
            Self::BeId => "beid",
            Self::LuxId => "luxeid",
            Self::Dnie => "dnie",
            Self::Emv => "emv",
            Self::Piv => "piv",
            Self::Ocra => "ocra",
            Self::Aventra => "aventra",
            Self::Oberthur => "oberthur",
            Self::Pkcs11 => "pkcs11",
        }
    }

    pub const fn capabilities(&self) -> &'static [CardCapability] {
        use CardCapability::*;
        match self {
            Self::BeId | Self::Dnie => &[Certificates, Pin, Data, Signing, Authentication],
            Self::LuxId | Self::Piv => &[Certificates, Pin, Biometric, Data, Signing, Authentication],
            Self::Emv => &[Pin, Data],
            Self::Ocra => &[Pin, Authentication],
            Self::Aventra | Self::Oberthur => &[Certificates, Pin, Signing, Authentication],
            Self::Pkcs11 => &[Certificates, Pin, Signing],
        }
    }

    pub fn supports(&self, capability: CardCapability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Fail with [`Error::UnsupportedCapability`] unless the card type has `capability`
    pub fn require(&self, capability: CardCapability) -> Result<()> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(Error::UnsupportedCapability {
                card: *self,
                capability,
            })
        }
    }
}

/// Body of a PIN-bearing card operation
#[derive(Serialize)]
struct OperationBody<'a> {
    #[serde(flatten)]
    pin: &'a CheckedPinRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    algorithm_reference: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a str>,
}

/// Card in a specific reader
#[derive(Debug, Clone)]
pub struct CardClient {
    kind: CardKind,
    reader_id: String,
    agent: AgentClient,
    enforcer: PinPolicyEnforcer,
}

impl CardClient {
    /// Create a client for the card of type `kind` in reader `reader_id`
    pub fn new(
        kind: CardKind,
        reader_id: impl Into<String>,
        agent: AgentClient,
        enforcer: PinPolicyEnforcer,
    ) -> Self {
        Self {
            kind,
            reader_id: reader_id.into(),
            agent,
            enforcer,
        }
    }

    /// Card type
    pub const fn kind(&self) -> CardKind {
        self.kind
    }

    /// Reader holding the card
    pub fn reader_id(&self) -> &str {
        &self.reader_id
    }

    /// Verify the card holder PIN
    #[instrument(skip(self, request), fields(card = %self.kind, reader = %self.reader_id))]
    pub async fn verify_pin(&self, request: PinRequest) -> Result<Value> {
        self.kind.require(CardCapability::Pin)?;
        self.operation("verify-pin", request, None, None).await
    }

    /// Sign `data` (base64 digest) with the key referenced by `algorithm_reference`
    #[instrument(skip(self, request, data), fields(card = %self.kind, reader = %self.reader_id))]
    pub async fn sign(&self, request: PinRequest, algorithm_reference: &str, data: &str) -> Result<Value> {
        self.kind.require(CardCapability::Signing)?;
        self.operation("sign", request, Some(algorithm_reference), Some(data))
            .await
    }

    /// Authenticate a challenge (base64) with the authentication key
    #[instrument(skip(self, request, data), fields(card = %self.kind, reader = %self.reader_id))]
    pub async fn authenticate(
        &self,
        request: PinRequest,
        algorithm_reference: &str,
        data: &str,
    ) -> Result<Value> {
        self.kind.require(CardCapability::Authentication)?;
        self.operation("authenticate", request, Some(algorithm_reference), Some(data))
            .await
    }

    async fn operation(
        &self,
        action: &str,
        request: PinRequest,
        algorithm_reference: Option<&str>,
        data: Option<&str>,
    ) -> Result<Value> {
        let checked = self.enforcer.check(&self.reader_id, request).await?;
        let body = serde_json::to_value(OperationBody {
            pin: &checked,
            algorithm_reference,
            data,
        })
        .map_err(|e| Error::InvalidData(e.to_string()))?;

        let path = format!("/plugins/{}/{}/{action}", self.kind.plugin(), self.reader_id);
        let response = self.agent.send(Request::post(Endpoint::Agent, path, body)).await?;
        Ok(agent::data(response)?)
    }
}
