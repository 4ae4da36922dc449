//! Device registration and synchronization with the distribution service

use cardgate_transport::TransportError;
use tracing::{debug, info, instrument, warn};

use crate::agent::AgentClient;
use crate::context::{SecurityContext, TrustedKeys};
use crate::ds::DistributionClient;
use crate::error::RegistrationStage;
use crate::types::{AgentInfo, AgentVersion, CapabilityToken, DeviceIdentity, DeviceSyncRequest, PlatformInfo};
use crate::{Error, Result};

/// How the device was brought in line with the distribution service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationMode {
    /// First-time registration followed by activation
    Registered,
    /// The device was already activated and has been synchronized
    Synchronized,
    /// The device is managed centrally; synchronization is best effort
    Managed,
}

/// Result of [`DeviceRegistrar::register_or_sync`]
#[derive(Debug, Clone)]
pub struct Registration {
    /// Identity reported to the distribution service
    pub identity: DeviceIdentity,
    /// Agent self-report the registration was based on
    pub info: AgentInfo,
    /// Which path was taken
    pub mode: RegistrationMode,
    /// Token obtained from the distribution service, also stored in the context
    pub token: Option<CapabilityToken>,
}

/// Registers or re-synchronizes the device and obtains a capability token
#[derive(Debug)]
pub struct DeviceRegistrar<'a> {
    agent: &'a AgentClient,
    ds: &'a DistributionClient,
    sync_managed: bool,
}

impl<'a> DeviceRegistrar<'a> {
    /// Create a registrar talking to `agent` and `ds`
    pub const fn new(agent: &'a AgentClient, ds: &'a DistributionClient) -> Self {
        Self {
            agent,
            ds,
            sync_managed: false,
        }
    }

    /// Also synchronize centrally managed devices
    pub const fn with_sync_managed(mut self, sync_managed: bool) -> Self {
        self.sync_managed = sync_managed;
        self
    }

    /// Register a new device, or synchronize a known one, and store the token
    #[instrument(skip_all)]
    pub async fn register_or_sync(
        &self,
        platform: PlatformInfo,
        context: &mut SecurityContext,
    ) -> Result<Registration> {
        let info = self.agent.info().await.map_err(|error| match error {
            Error::Transport(source) => Error::registration(RegistrationStage::Info, source),
            other => other,
        })?;
        if !info.capabilities.token_compatible {
            return Err(Error::IncompatibleAgent {
                found: info.version,
                required: AgentVersion::TOKEN_COMPATIBLE,
            });
        }

        let identity = DeviceIdentity::new(&info, platform);

        if info.managed {
            let token = self.sync_managed_device(&identity, &info, context).await;
            return Ok(Registration {
                identity,
                info,
                mode: RegistrationMode::Managed,
                token,
            });
        }

        let (mode, token) = if info.activated {
            let body = device_body(&identity, &info, context, true);
            let response = self.ds.sync(&body).await.map_err(at(RegistrationStage::Sync))?;
            (RegistrationMode::Synchronized, store(context, response.token)?)
        } else {
            info!(uuid = %identity.uuid, "registering device");
            let body = device_body(&identity, &info, context, false);
            let response = self
                .ds
                .register(&body)
                .await
                .map_err(at(RegistrationStage::Register))?;
            let registered = store(context, response.token)?;

            self.agent
                .activate(context.bearer())
                .await
                .map_err(|error| match error {
                    Error::Transport(source) => Error::registration(RegistrationStage::Activate, source),
                    other => other,
                })?;
            debug!("agent activated");

            let body = device_body(&identity, &info, context, true);
            let response = self.ds.sync(&body).await.map_err(at(RegistrationStage::Sync))?;
            let synced = store(context, response.token)?;
            (RegistrationMode::Registered, synced.or(registered))
        };

        Ok(Registration {
            identity,
            info,
            mode,
            token,
        })
    }

    async fn sync_managed_device(
        &self,
        identity: &DeviceIdentity,
        info: &AgentInfo,
        context: &mut SecurityContext,
    ) -> Option<CapabilityToken> {
        if !self.sync_managed {
            debug!("managed device, synchronization disabled");
            return None;
        }

        let body = device_body(identity, info, context, info.activated);
        match self.ds.sync(&body).await {
            Ok(response) => store(context, response.token).unwrap_or_else(|error| {
                warn!(%error, "ignoring unreadable token for managed device");
                None
            }),
            Err(error) => {
                warn!(%error, "managed device synchronization failed");
                None
            }
        }
    }

    /// Tell the distribution service which containers ended up installed
    ///
    /// Sent once after a synchronization run that had to download
    /// containers. The returned token is not stored.
    #[instrument(skip_all, fields(uuid = %identity.uuid))]
    pub async fn report_containers(
        &self,
        identity: &DeviceIdentity,
        context: &SecurityContext,
    ) -> Result<()> {
        let info = self.agent.info().await.map_err(|error| match error {
            Error::Transport(source) => Error::registration(RegistrationStage::Info, source),
            other => other,
        })?;
        let body = device_body(identity, &info, context, true);
        self.ds.sync(&body).await.map_err(at(RegistrationStage::Sync))?;
        debug!("installed containers reported");
        Ok(())
    }
}

fn device_body(
    identity: &DeviceIdentity,
    info: &AgentInfo,
    context: &SecurityContext,
    activated: bool,
) -> DeviceSyncRequest {
    DeviceSyncRequest::new(identity, info.managed, activated)
        .with_pub_key(context.keys().map(TrustedKeys::encryption_key))
        .with_containers(&info.containers)
}

fn at(stage: RegistrationStage) -> impl FnOnce(TransportError) -> Error {
    move |source| Error::registration(stage, source)
}

/// Decode a returned token and make it the current one
fn store(context: &mut SecurityContext, raw: Option<String>) -> Result<Option<CapabilityToken>> {
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return Ok(None);
    };
    let token = CapabilityToken::decode(&raw)?;
    context.replace_token(token.clone());
    Ok(Some(token))
}
