use std::time::Duration;

use cardgate_transport::{RestError, TransportError};
use derive_more::Display;

use crate::card::{CardCapability, CardKind};
use crate::pin::PinError;
use crate::security::BootstrapError;
use crate::sync::SyncError;
use crate::types::{AgentVersion, TokenError};

/// Result type for orchestrator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Step of the registration flow that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RegistrationStage {
    #[display("info")]
    Info,
    #[display("register")]
    Register,
    #[display("activate")]
    Activate,
    #[display("sync")]
    Sync,
}

/// Error type for orchestrator operations
///
/// Every variant reduces to a machine-readable code and a description with
/// [`Error::code`] and [`Error::description`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A request to the agent or the distribution service failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The installed agent cannot take part in the bootstrap
    #[error("Installed agent version {found} is not compatible, at least {required} is required")]
    IncompatibleAgent {
        found: AgentVersion,
        required: AgentVersion,
    },

    /// No trusted key could be established on the agent
    #[error(transparent)]
    SecurityBootstrap(#[from] BootstrapError),

    /// A registration step failed
    #[error("Device {stage} failed: {source}")]
    Registration {
        stage: RegistrationStage,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Pin(#[from] PinError),

    #[error("{card} cards do not support {capability}")]
    UnsupportedCapability {
        card: CardKind,
        capability: CardCapability,
    },

    #[error("No card inserted within {0:?}")]
    CardWaitTimeout(Duration),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    pub(crate) const fn registration(stage: RegistrationStage, source: TransportError) -> Self {
        Self::Registration { stage, source }
    }

    /// Machine-readable error code
    pub fn code(&self) -> String {
        match self {
            Self::Transport(error) | Self::Registration { source: error, .. } => error.code(),
            Self::IncompatibleAgent { .. } => "301".to_string(),
            Self::SecurityBootstrap(_) => "302".to_string(),
            Self::Token(error) => error.code().to_string(),
            Self::Sync(error) => error.code(),
            Self::Pin(error) => error.code(),
            Self::UnsupportedCapability { .. } => "620".to_string(),
            Self::CardWaitTimeout(_) => "408".to_string(),
            Self::InvalidData(_) => "400".to_string(),
        }
    }

    /// HTTP-style status of the error
    pub fn status(&self) -> u16 {
        match self {
            Self::Transport(error) | Self::Registration { source: error, .. } => error.status(),
            Self::IncompatibleAgent { .. }
            | Self::UnsupportedCapability { .. }
            | Self::InvalidData(_) => 400,
            Self::SecurityBootstrap(_) => 500,
            Self::CardWaitTimeout(_) => 408,
            Self::Token(TokenError::Missing) => 412,
            Self::Token(TokenError::Invalid(_)) => 400,
            Self::Sync(error) => error.status(),
            Self::Pin(error) => error.status(),
        }
    }

    /// Human-readable description
    ///
    /// For remote failures this is the description reported by the remote
    /// party rather than the wrapped message.
    pub fn description(&self) -> String {
        match self {
            Self::Transport(error) => error.to_rest().description,
            other => other.to_string(),
        }
    }

    /// Reduce the error to the structured form used on the wire
    pub fn to_rest(&self) -> RestError {
        RestError::new(self.status(), self.code(), self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_keeps_originating_code() {
        let source = TransportError::Rest(RestError::new(409, "112", "Device already registered"));
        let error = Error::registration(RegistrationStage::Register, source);

        assert_eq!(error.code(), "112");
        assert_eq!(error.status(), 409);
        assert!(error.to_string().starts_with("Device register failed"));
    }

    #[test]
    fn test_incompatible_agent() {
        let error = Error::IncompatibleAgent {
            found: AgentVersion::new(1, 3, 0),
            required: AgentVersion::TOKEN_COMPATIBLE,
        };
        let rest = error.to_rest();
        assert_eq!(rest.code, "301");
        assert_eq!(rest.status, 400);
        assert!(rest.description.contains("1.3.0"));
    }

    #[test]
    fn test_transport_description_is_remote_description() {
        let error = Error::from(TransportError::Rest(RestError::new(404, "301", "Reader not found")));
        assert_eq!(error.description(), "Reader not found");
        assert_eq!(error.code(), "301");
    }
}
