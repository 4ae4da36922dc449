//! Container synchronization
//!
//! Resolves the containers a capability token requires against what the
//! agent reports and drives the agent until all of them are installed.

mod state;
mod timer;

pub use state::{Assessment, Step, SyncState};
pub use timer::{Timer, TokioTimer};

use cardgate_transport::TransportError;
use tracing::{debug, info, instrument, warn};

use crate::agent::AgentClient;
use crate::config::SyncConfig;
use crate::types::{CapabilityToken, Container, ContainerSupport, TokenError};
use crate::{Error, Result};

/// Terminal failure of a synchronization run
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The agent could not be reached while synchronizing
    #[error("Agent request failed during container synchronization: {0}")]
    Agent(#[source] TransportError),

    /// Containers kept failing after every allowed re-trigger
    #[error("Container download failed: {}", failed.join(", "))]
    ContainerDownload { failed: Vec<String> },

    /// Containers were still pending when the deadline passed
    #[error("Container download did not complete before timeout: {}", pending.join(", "))]
    Timeout { pending: Vec<String> },
}

impl SyncError {
    /// Machine-readable error code
    pub fn code(&self) -> String {
        match self {
            Self::Token(error) => error.code().to_string(),
            Self::Agent(error) => error.code(),
            Self::ContainerDownload { .. } => "903".to_string(),
            Self::Timeout { .. } => "904".to_string(),
        }
    }

    /// HTTP status reported for the error
    pub fn status(&self) -> u16 {
        match self {
            Self::Token(TokenError::Missing) => 412,
            Self::Token(TokenError::Invalid(_)) => 400,
            Self::Agent(error) => error.status(),
            Self::ContainerDownload { .. } => 500,
            Self::Timeout { .. } => 408,
        }
    }
}

/// Successful end of a synchronization run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Every required container is installed
    Complete {
        /// Whether a download had to be requested
        triggered: bool,
        /// Re-triggers needed after download errors
        retries: u32,
    },
    /// The agent has no container subsystem
    LegacyAgent,
    /// The device is managed centrally and containers are not driven from here
    Managed,
}

/// Drives the agent until the containers required by a token are installed
#[derive(Debug)]
pub struct ContainerSyncCoordinator<'a> {
    agent: &'a AgentClient,
    timer: &'a dyn Timer,
    config: SyncConfig,
}

impl<'a> ContainerSyncCoordinator<'a> {
    /// Create a coordinator polling `agent` on `timer` within the bounds of `config`
    pub const fn new(agent: &'a AgentClient, timer: &'a dyn Timer, config: SyncConfig) -> Self {
        Self {
            agent,
            timer,
            config,
        }
    }

    /// Synchronize the containers required by `jwt`
    ///
    /// `None` or an empty string fails with [`TokenError::Missing`].
    #[instrument(skip_all)]
    pub async fn synchronize(&self, jwt: Option<&str>) -> Result<SyncOutcome> {
        let jwt = jwt.unwrap_or_default();
        let token = CapabilityToken::decode(jwt).map_err(SyncError::from)?;
        let required = token.required();
        debug!(%required, "required containers");

        let Some(containers) = self.containers().await? else {
            info!("agent has no container subsystem");
            return Ok(SyncOutcome::LegacyAgent);
        };
        if Assessment::new(required, &containers).is_complete() {
            debug!("required containers already installed");
            return Ok(SyncOutcome::Complete {
                triggered: false,
                retries: 0,
            });
        }

        let deadline = self.timer.now() + self.config.timeout();
        let mut state = SyncState::Triggering { retries: 0 };
        loop {
            state = match state {
                SyncState::Triggering { retries } => {
                    self.agent
                        .sync_containers(jwt, Some(jwt))
                        .await
                        .map_err(agent_failure)?;
                    self.timer.sleep(self.config.poll_interval()).await;
                    SyncState::Polling { retries, deadline }
                }
                SyncState::Polling { retries, .. } => {
                    let containers = self.containers().await?.unwrap_or_default();
                    let assessment = Assessment::new(required, &containers);
                    match state.on_poll(assessment, self.timer.now(), self.config.max_retries) {
                        Step::Complete => {
                            info!(retries, "containers installed");
                            return Ok(SyncOutcome::Complete {
                                triggered: true,
                                retries,
                            });
                        }
                        Step::Retrigger(retries) => {
                            warn!(
                                retries,
                                max_retries = self.config.max_retries,
                                "container download failed, requesting it again"
                            );
                            SyncState::Triggering { retries }
                        }
                        Step::Wait => {
                            self.timer.sleep(self.config.poll_interval()).await;
                            state
                        }
                        Step::DownloadFailed(failed) => {
                            return Err(SyncError::ContainerDownload { failed }.into());
                        }
                        Step::TimedOut(pending) => {
                            return Err(SyncError::Timeout { pending }.into());
                        }
                    }
                }
            };
        }
    }

    /// Current container list, `None` for agents without containers
    async fn containers(&self) -> Result<Option<Vec<Container>>> {
        let info = self.agent.info().await.map_err(agent_failure)?;
        Ok(match info.containers {
            ContainerSupport::Legacy => None,
            ContainerSupport::Managed(containers) => Some(containers),
        })
    }
}

fn agent_failure(error: Error) -> Error {
    match error {
        Error::Transport(source) => SyncError::Agent(source).into(),
        other => other,
    }
}
