//! Establishing the key the agent trusts

use cardgate_transport::TransportError;
use tracing::{debug, info, instrument, warn};

use crate::agent::AgentClient;
use crate::context::TrustedKeys;
use crate::ds::DistributionClient;
use crate::{Error, Result};

/// Failure to establish a trusted key on the agent
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Neither the agent nor the distribution service could provide a key
    #[error("No public key available: agent read failed ({agent}), distribution service fetch failed ({remote})")]
    NoKey {
        agent: String,
        #[source]
        remote: TransportError,
    },

    /// The agent refused the key
    #[error("Failed to push the public key to the agent: {0}")]
    Push(#[source] TransportError),
}

/// Ensures the agent holds a public key trusted by the distribution service
#[derive(Debug)]
pub struct SecurityContextEstablisher<'a> {
    agent: &'a AgentClient,
    ds: &'a DistributionClient,
}

impl<'a> SecurityContextEstablisher<'a> {
    pub const fn new(agent: &'a AgentClient, ds: &'a DistributionClient) -> Self {
        Self { agent, ds }
    }

    /// Read the agent's key, installing the distribution service key when it
    /// has none
    #[instrument(skip_all)]
    pub async fn establish(&self) -> Result<TrustedKeys> {
        let agent_failure = match self.agent.certificate().await {
            Ok(Some(certificate)) => {
                debug!("agent already holds a public key");
                return Ok(TrustedKeys::new(certificate.device));
            }
            Ok(None) => "no key installed".to_string(),
            Err(error) => {
                warn!(%error, "could not read the agent key");
                error.to_string()
            }
        };

        let public_key = self.ds.public_key().await.map_err(|remote| BootstrapError::NoKey {
            agent: agent_failure,
            remote,
        })?;
        self.agent
            .set_certificate(&public_key, None)
            .await
            .map_err(|error| match error {
                Error::Transport(source) => Error::from(BootstrapError::Push(source)),
                other => other,
            })?;
        info!("installed the distribution service key on the agent");

        // Agents with a device key report it once a trusted key is installed.
        let device_key = match self.agent.certificate().await {
            Ok(certificate) => certificate.map(|certificate| certificate.device),
            Err(error) => {
                debug!(%error, "could not confirm the installed key");
                None
            }
        };
        Ok(TrustedKeys::new(public_key).with_device_key(device_key))
    }
}
