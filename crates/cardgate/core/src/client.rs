//! High level entry point tying the orchestrator components together

use std::sync::Arc;
use std::time::Duration;

use async_lock::RwLock;
use cardgate_transport::{HttpTransport, Transport};
use tracing::{info, instrument};

use crate::agent::AgentClient;
use crate::card::{CardClient, CardKind};
use crate::config::ClientConfig;
use crate::context::SecurityContext;
use crate::ds::{DistributionClient, DownloadLink};
use crate::pin::{PinPolicy, PinPolicyEnforcer};
use crate::registrar::{DeviceRegistrar, RegistrationMode};
use crate::security::SecurityContextEstablisher;
use crate::sync::{ContainerSyncCoordinator, SyncOutcome, Timer, TokioTimer};
use crate::types::{AgentInfo, CapabilityToken, CardReader, DeviceIdentity, PlatformInfo};
use crate::Result;

/// Summary of a completed [`Client::initialize`]
#[derive(Debug, Clone)]
pub struct Initialization {
    /// Identity reported to the distribution service
    pub identity: DeviceIdentity,
    /// Agent self-report at registration time
    pub agent: AgentInfo,
    /// Whether the device was registered, synchronized or is managed
    pub mode: RegistrationMode,
    /// Result of container synchronization
    pub sync: SyncOutcome,
}

/// Orchestrates the agent and the distribution service for one device
///
/// The client exclusively owns the [`SecurityContext`]. Initialization and
/// token refresh hold its write lock for their whole duration, so container
/// synchronization always sees the token written by the preceding step.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    agent: AgentClient,
    ds: DistributionClient,
    timer: Arc<dyn Timer>,
    platform: PlatformInfo,
    context: RwLock<SecurityContext>,
}

impl Client {
    /// Create a client speaking HTTP to the configured endpoints
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.http_config()?)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client on top of an existing transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let download_base = config.distribution_url.as_ref().map(|url| {
            let mut base = url.clone();
            base.set_path("");
            base.set_query(None);
            base
        });
        Self {
            agent: AgentClient::new(transport.clone()),
            ds: DistributionClient::new(transport, download_base, config.api_key.clone()),
            timer: Arc::new(TokioTimer),
            platform: PlatformInfo::from_host(),
            context: RwLock::new(SecurityContext::default()),
            config,
        }
    }

    /// Replace the clock driving the polling loops
    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = timer;
        self
    }

    /// Replace the platform snapshot reported to the distribution service
    pub fn with_platform(mut self, platform: PlatformInfo) -> Self {
        self.platform = platform;
        self
    }

    /// Active configuration
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Client for the local agent
    pub const fn agent(&self) -> &AgentClient {
        &self.agent
    }

    /// Client for the distribution service
    pub const fn distribution(&self) -> &DistributionClient {
        &self.ds
    }

    /// Establish trust, register or synchronize the device, and install the
    /// containers its token requires
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<Initialization> {
        let mut context = self.context.write().await;

        let keys = SecurityContextEstablisher::new(&self.agent, &self.ds)
            .establish()
            .await?;
        context.set_keys(keys);

        let registrar =
            DeviceRegistrar::new(&self.agent, &self.ds).with_sync_managed(self.sync_managed());
        let registration = registrar
            .register_or_sync(self.platform.clone(), &mut context)
            .await?;

        let sync = match registration.mode {
            RegistrationMode::Managed => SyncOutcome::Managed,
            RegistrationMode::Registered | RegistrationMode::Synchronized => {
                ContainerSyncCoordinator::new(&self.agent, self.timer.as_ref(), self.config.sync)
                    .synchronize(context.bearer())
                    .await?
            }
        };
        if let SyncOutcome::Complete { triggered: true, .. } = sync {
            registrar
                .report_containers(&registration.identity, &context)
                .await?;
        }
        info!(uuid = %registration.identity.uuid, ?sync, "device ready");

        Ok(Initialization {
            identity: registration.identity,
            agent: registration.info,
            mode: registration.mode,
            sync,
        })
    }

    /// Exchange the current token for a fresh one
    #[instrument(skip(self))]
    pub async fn refresh_token(&self) -> Result<CapabilityToken> {
        let mut context = self.context.write().await;
        let raw = self.ds.refresh_token(context.bearer()).await?;
        let token = CapabilityToken::decode(&raw)?;
        context.replace_token(token.clone());
        Ok(token)
    }

    /// Snapshot of the current security context
    pub async fn context(&self) -> SecurityContext {
        self.context.read().await.clone()
    }

    /// Enforcer bound to the keys established during initialization
    pub async fn pin_enforcer(&self) -> PinPolicyEnforcer {
        let keys = self.context.read().await.keys().cloned();
        PinPolicyEnforcer::new(
            self.agent.clone(),
            keys,
            PinPolicy::new(self.config.force_hardware_pinpad),
        )
        .with_os_pin_dialog(self.config.os_pin_dialog)
    }

    /// Card of type `kind` in reader `reader_id`
    pub async fn card(&self, kind: CardKind, reader_id: impl Into<String>) -> CardClient {
        CardClient::new(kind, reader_id, self.agent.clone(), self.pin_enforcer().await)
    }

    /// Installer download link for this platform
    pub async fn download_link(&self) -> Result<DownloadLink> {
        Ok(self.ds.download_link(&self.platform).await?)
    }

    /// Wait until a card is inserted in any reader
    pub async fn wait_for_card(&self, timeout: Duration) -> Result<CardReader> {
        self.agent.wait_for_card(self.timer.as_ref(), timeout).await
    }

    fn sync_managed(&self) -> bool {
        self.config.sync_managed
            && self.config.distribution_url.is_some()
            && self.config.api_key.is_some()
    }
}
