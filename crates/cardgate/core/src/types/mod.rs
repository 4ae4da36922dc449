//! Data model shared by the orchestrator components

mod container;
mod device;
mod platform;
mod reader;
mod token;
mod version;

pub use container::{Container, ContainerStatus};
pub use device::{
    AgentInfo, AgentInfoResponse, ContainerSupport, DeviceIdentity, DeviceResponse,
    DeviceSyncRequest,
};
pub use platform::{BrowserInfo, OsInfo, PlatformInfo};
pub use reader::{Card, CardReader, ReaderFilter};
pub use token::{CapabilityToken, RequiredContainerSet, TokenError};
pub use version::{AgentCapabilities, AgentVersion};
