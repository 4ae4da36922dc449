//! Device bootstrap and container synchronization for smartcard agents.
//!
//! A [`Client`] drives two remote parties: the card agent installed on the
//! host, and the distribution service that registers devices and decides
//! which card plugins ("containers") they need. Initialization runs three
//! steps in order:
//!
//! 1. [`SecurityContextEstablisher`] makes sure the agent holds a key the
//!    distribution service trusts.
//! 2. [`DeviceRegistrar`] registers or re-synchronizes the device and obtains
//!    a signed [`CapabilityToken`].
//! 3. [`ContainerSyncCoordinator`] asks the agent to install the containers
//!    the token requires and polls until they are installed, with bounded
//!    retries and an overall deadline.
//!
//! Card operations that carry a PIN go through [`PinPolicyEnforcer`], which
//! applies the strict pinpad policy and encrypts the PIN under the
//! established key before anything leaves the host.
//!
//! # Examples
//!
//! ```no_run
//! # async fn run() -> cardgate::Result<()> {
//! use cardgate::{CardKind, Client, ClientConfig, PinRequest};
//!
//! let config = ClientConfig::default()
//!     .with_distribution_url("https://ds.example.com/v1".parse().unwrap())
//!     .with_api_key("api-key");
//! let client = Client::new(config)?;
//!
//! let init = client.initialize().await?;
//! println!("device {} ready: {:?}", init.identity.uuid, init.sync);
//!
//! let card = client.card(CardKind::BeId, "reader-1").await;
//! card.verify_pin(PinRequest::with_pin("1234")).await?;
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod agent;
mod card;
mod client;
mod config;
mod context;
mod ds;
mod error;
mod pin;
mod registrar;
mod security;
mod sync;
mod types;

#[cfg(test)]
mod testing;

pub use agent::{AgentCertificate, AgentClient};
pub use card::{CardCapability, CardClient, CardKind};
pub use client::{Client, Initialization};
pub use config::{ClientConfig, DEFAULT_AGENT_URL, SyncConfig};
pub use context::{SecurityContext, TrustedKeys};
pub use ds::{DistributionClient, DownloadLink};
pub use error::{Error, RegistrationStage, Result};
pub use pin::{
    CheckedPinRequest, Pin, PinError, PinPolicy, PinPolicyEnforcer, PinRequest, PolicyViolation,
    encrypt_pin, parse_public_key,
};
pub use registrar::{DeviceRegistrar, Registration, RegistrationMode};
pub use security::{BootstrapError, SecurityContextEstablisher};
pub use sync::{
    Assessment, ContainerSyncCoordinator, Step, SyncError, SyncOutcome, SyncState, Timer,
    TokioTimer,
};
pub use types::*;

pub use cardgate_transport as transport;
