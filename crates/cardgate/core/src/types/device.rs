use serde::{Deserialize, Serialize};

use super::{AgentCapabilities, AgentVersion, Container, PlatformInfo};

/// Self-report of the agent (`GET /`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentInfoResponse {
    #[serde(default)]
    pub activated: bool,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    pub uid: String,
    pub version: String,
    /// Absent on agents without a container subsystem
    #[serde(default)]
    pub containers: Option<Vec<Container>>,
}

/// Container subsystem of an agent, resolved by capability detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerSupport {
    /// The agent predates containers; there is nothing to synchronize
    Legacy,
    /// The agent manages containers; this is the current status list
    Managed(Vec<Container>),
}

/// Agent self-report after capability detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInfo {
    pub activated: bool,
    pub managed: bool,
    pub arch: Option<String>,
    pub os: Option<String>,
    pub uid: String,
    pub version: AgentVersion,
    pub capabilities: AgentCapabilities,
    pub containers: ContainerSupport,
}

impl TryFrom<AgentInfoResponse> for AgentInfo {
    type Error = crate::Error;

    fn try_from(response: AgentInfoResponse) -> Result<Self, Self::Error> {
        let version: AgentVersion = response.version.parse()?;
        let capabilities = version.capabilities();
        let containers = match response.containers {
            Some(containers) if capabilities.v2_compatible => ContainerSupport::Managed(containers),
            _ => ContainerSupport::Legacy,
        };

        Ok(Self {
            activated: response.activated,
            managed: response.managed,
            arch: response.arch,
            os: response.os,
            uid: response.uid,
            version,
            capabilities,
            containers,
        })
    }
}

/// Identity of this device for the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Device identifier, the agent `uid`
    pub uuid: String,
    pub core_version: AgentVersion,
    pub platform: PlatformInfo,
}

impl DeviceIdentity {
    /// Identity of the device running `info` on `platform`
    pub fn new(info: &AgentInfo, platform: PlatformInfo) -> Self {
        Self {
            uuid: info.uid.clone(),
            core_version: info.version,
            platform,
        }
    }
}

/// Body of the register (`PUT /devices/{uuid}`) and sync (`POST /devices/{uuid}`) calls
///
/// Both calls share this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSyncRequest {
    pub uuid: String,
    pub version: String,
    pub managed: bool,
    pub activated: bool,
    /// Device key the agent encrypts with
    #[serde(rename = "pubKey", default, skip_serializing_if = "Option::is_none")]
    pub pub_key: Option<String>,
    /// Containers as last reported by the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub containers: Option<Vec<Container>>,
    #[serde(flatten)]
    pub platform: PlatformInfo,
}

impl DeviceSyncRequest {
    /// Body for `identity` with the given management and activation flags
    pub fn new(identity: &DeviceIdentity, managed: bool, activated: bool) -> Self {
        Self {
            uuid: identity.uuid.clone(),
            version: identity.core_version.to_string(),
            managed,
            activated,
            pub_key: None,
            containers: None,
            platform: identity.platform.clone(),
        }
    }

    /// Report the agent's device key
    pub fn with_pub_key(mut self, pub_key: Option<&str>) -> Self {
        self.pub_key = pub_key.map(str::to_owned);
        self
    }

    /// Report the agent's containers; legacy agents report none
    pub fn with_containers(mut self, containers: &ContainerSupport) -> Self {
        self.containers = match containers {
            ContainerSupport::Legacy => None,
            ContainerSupport::Managed(containers) => Some(containers.clone()),
        };
        self
    }
}

/// Response of the register and sync calls
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceResponse {
    #[serde(default)]
    pub token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContainerStatus;
    use serde_json::json;

    #[test]
    fn test_v2_agent_reports_containers() {
        let response: AgentInfoResponse = serde_json::from_value(json!({
            "activated": true,
            "managed": false,
            "uid": "device-1",
            "version": "2.2.0",
            "containers": [{ "name": "beid", "version": "1.0.0", "status": "INSTALLED" }]
        }))
        .unwrap();
        let info = AgentInfo::try_from(response).unwrap();

        assert!(info.capabilities.v2_compatible);
        assert_eq!(
            info.containers,
            ContainerSupport::Managed(vec![Container::new("beid", "1.0.0", ContainerStatus::Installed)])
        );
    }

    #[test]
    fn test_legacy_agent_without_containers() {
        let response: AgentInfoResponse = serde_json::from_value(json!({
            "activated": true,
            "uid": "device-1",
            "version": "1.5.3"
        }))
        .unwrap();
        let info = AgentInfo::try_from(response).unwrap();

        assert!(info.capabilities.token_compatible);
        assert_eq!(info.containers, ContainerSupport::Legacy);
    }

    #[test]
    fn test_sync_request_flattens_platform() {
        let identity = DeviceIdentity {
            uuid: "device-1".into(),
            core_version: AgentVersion::new(2, 1, 0),
            platform: PlatformInfo::default().with_user_agent("test-agent"),
        };
        let body = serde_json::to_value(DeviceSyncRequest::new(&identity, false, true)).unwrap();

        assert_eq!(body["uuid"], "device-1");
        assert_eq!(body["version"], "2.1.0");
        assert_eq!(body["activated"], true);
        assert_eq!(body["ua"], "test-agent");
        assert!(body["browser"].is_object());
        assert!(body.get("platform").is_none());
        assert!(body.get("pubKey").is_none());
        assert!(body.get("containers").is_none());
    }

    #[test]
    fn test_sync_request_reports_key_and_containers() {
        let identity = DeviceIdentity {
            uuid: "device-1".into(),
            core_version: AgentVersion::new(2, 1, 0),
            platform: PlatformInfo::default(),
        };
        let installed = ContainerSupport::Managed(vec![Container::new(
            "beid",
            "1.0.0",
            ContainerStatus::Installed,
        )]);
        let body = DeviceSyncRequest::new(&identity, false, true)
            .with_pub_key(Some("device-key"))
            .with_containers(&installed);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["pubKey"], "device-key");
        assert_eq!(
            json["containers"],
            json!([{ "name": "beid", "version": "1.0.0", "status": "INSTALLED" }])
        );

        let legacy = body.with_containers(&ContainerSupport::Legacy);
        assert!(legacy.containers.is_none());
    }
}
