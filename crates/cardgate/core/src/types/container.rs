use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle status of a plugin container on the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerStatus {
    Init,
    Downloading,
    Installed,
    DownloadError,
    Error,
    /// A status this library does not know about
    Unknown,
}

impl ContainerStatus {
    /// The container failed and needs a new download request
    pub const fn is_errored(&self) -> bool {
        matches!(self, Self::DownloadError | Self::Error)
    }

    /// The container is still on its way to a terminal state
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Init | Self::Downloading | Self::Unknown)
    }

    pub const fn is_installed(&self) -> bool {
        matches!(self, Self::Installed)
    }
}

// Agents have reported both `download_error` and `DOWNLOAD_ERROR`.
impl<'de> Deserialize<'de> for ContainerStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_ascii_uppercase().as_str() {
            "INIT" => Self::Init,
            "DOWNLOADING" => Self::Downloading,
            "INSTALLED" => Self::Installed,
            "DOWNLOAD_ERROR" => Self::DownloadError,
            "ERROR" => Self::Error,
            _ => Self::Unknown,
        })
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "INIT",
            Self::Downloading => "DOWNLOADING",
            Self::Installed => "INSTALLED",
            Self::DownloadError => "DOWNLOAD_ERROR",
            Self::Error => "ERROR",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// A plugin container as reported by the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub status: ContainerStatus,
}

impl Container {
    pub fn new(name: impl Into<String>, version: impl Into<String>, status: ContainerStatus) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_is_case_insensitive() {
        let lower: Container =
            serde_json::from_value(json!({ "name": "beid", "version": "1.0.0", "status": "download_error" }))
                .unwrap();
        let upper: Container =
            serde_json::from_value(json!({ "name": "beid", "version": "1.0.0", "status": "DOWNLOAD_ERROR" }))
                .unwrap();
        assert_eq!(lower.status, ContainerStatus::DownloadError);
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_unknown_status_is_busy() {
        let container: Container =
            serde_json::from_value(json!({ "name": "emv", "status": "VERIFYING" })).unwrap();
        assert_eq!(container.status, ContainerStatus::Unknown);
        assert!(container.status.is_busy());
        assert!(container.version.is_empty());
    }
}
