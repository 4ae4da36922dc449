use serde::{Deserialize, Serialize};

/// Name and version of the host application
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BrowserInfo {
    pub name: String,
    pub version: String,
}

/// Operating system of the host
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OsInfo {
    pub name: String,
    pub version: String,
    pub architecture: String,
}

/// Read-only snapshot of the host environment
///
/// Sent to the distribution service on registration and synchronization and
/// used to request an installer download link.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub manufacturer: String,
    pub browser: BrowserInfo,
    pub os: OsInfo,
    pub ua: String,
}

impl PlatformInfo {
    /// Snapshot of the running process
    ///
    /// The crate itself stands in for the browser. Hosts embedding the
    /// library should override `browser` and `ua` with their own values.
    pub fn from_host() -> Self {
        let name = env!("CARGO_PKG_NAME").to_string();
        let version = env!("CARGO_PKG_VERSION").to_string();
        let ua = format!(
            "{name}/{version} ({}; {})",
            std::env::consts::OS,
            std::env::consts::ARCH
        );

        Self {
            manufacturer: String::new(),
            browser: BrowserInfo { name, version },
            os: OsInfo {
                name: std::env::consts::OS.to_string(),
                version: String::new(),
                architecture: std::env::consts::ARCH.to_string(),
            },
            ua,
        }
    }

    pub fn with_browser(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.browser = BrowserInfo {
            name: name.into(),
            version: version.into(),
        };
        self
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.ua = ua.into();
        self
    }

    pub fn with_os_version(mut self, version: impl Into<String>) -> Self {
        self.os.version = version.into();
        self
    }
}
