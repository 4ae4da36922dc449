//! Configuration of the orchestrator

use std::time::Duration;

use cardgate_transport::{HttpConfig, TransportError};
use serde::{Deserialize, Serialize};
use url::Url;

/// Default base URL of the local agent API
pub const DEFAULT_AGENT_URL: &str = "https://localhost:10443/v2";

/// Bounds of the container synchronization loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Re-triggers allowed after a container reports a download error
    pub max_retries: u32,

    /// Delay between two status polls, in milliseconds
    pub poll_interval_ms: u64,

    /// Overall time allowed for containers to install, in seconds
    pub timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            poll_interval_ms: 1_000,
            timeout_secs: 30,
        }
    }
}

impl SyncConfig {
    /// Delay between two status polls
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Overall time allowed for containers to install
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the poll interval, saturating at `u64::MAX` milliseconds
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the overall timeout, rounded up to whole seconds
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        let partial = timeout.subsec_nanos() > 0;
        self.timeout_secs = timeout.as_secs().saturating_add(partial as u64);
        self
    }
}

/// Configuration of a [`Client`](crate::Client)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the local agent API, including its version prefix
    pub agent_url: String,

    /// Base URL of the distribution service API
    pub distribution_url: Option<Url>,

    /// API key for the distribution service
    pub api_key: Option<String>,

    /// Reject PIN submissions that bypass a hardware pinpad, and PIN-less
    /// submissions on readers without one
    pub force_hardware_pinpad: bool,

    /// The OS offers its own PIN dialog for readers without a pinpad
    pub os_pin_dialog: bool,

    /// Skip certificate verification for the local agent
    pub accept_invalid_agent_certs: bool,

    /// Per-request timeout, in seconds
    pub request_timeout_secs: u64,

    /// Synchronize centrally managed devices with the distribution service
    pub sync_managed: bool,

    pub sync: SyncConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            agent_url: DEFAULT_AGENT_URL.to_string(),
            distribution_url: None,
            api_key: None,
            force_hardware_pinpad: false,
            os_pin_dialog: false,
            accept_invalid_agent_certs: true,
            request_timeout_secs: 30,
            sync_managed: true,
            sync: SyncConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given agent URL
    pub fn new(agent_url: impl Into<String>) -> Self {
        Self {
            agent_url: agent_url.into(),
            ..Default::default()
        }
    }

    pub fn with_distribution_url(mut self, url: Url) -> Self {
        self.distribution_url = Some(url);
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub const fn with_force_hardware_pinpad(mut self, force: bool) -> Self {
        self.force_hardware_pinpad = force;
        self
    }

    pub const fn with_os_pin_dialog(mut self, enabled: bool) -> Self {
        self.os_pin_dialog = enabled;
        self
    }

    pub const fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Transport configuration matching this client configuration
    pub fn http_config(&self) -> Result<HttpConfig, TransportError> {
        let mut http = HttpConfig::new(self.agent_url.parse()?)
            .with_timeout(self.request_timeout())
            .with_accept_invalid_agent_certs(self.accept_invalid_agent_certs);
        if let Some(url) = &self.distribution_url {
            http = http.with_distribution_url(url.clone());
        }
        if let Some(api_key) = &self.api_key {
            http = http.with_api_key(api_key.clone());
        }
        Ok(http)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.agent_url, DEFAULT_AGENT_URL);
        assert_eq!(config.sync.max_retries, 3);
        assert_eq!(config.sync.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.sync.timeout(), Duration::from_secs(30));
        assert!(!config.force_hardware_pinpad);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{ "api_key": "abc", "os_pin_dialog": true, "sync": { "max_retries": 5 } }"#,
        )
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("abc"));
        assert!(config.os_pin_dialog);
        assert_eq!(config.sync.max_retries, 5);
        assert_eq!(config.sync.timeout_secs, 30);
        assert_eq!(config.agent_url, DEFAULT_AGENT_URL);
    }

    #[test]
    fn test_http_config() {
        let config = ClientConfig::default()
            .with_distribution_url("https://ds.example.com/v1".parse().unwrap())
            .with_api_key("key");
        let http = config.http_config().unwrap();

        assert_eq!(http.api_key.as_deref(), Some("key"));
        assert_eq!(http.timeout, Duration::from_secs(30));
        assert!(http.accept_invalid_agent_certs);
        assert_eq!(http.agent_url.as_str(), "https://localhost:10443/v2");
    }

    #[test]
    fn test_sync_durations_never_shrink() {
        let sync = SyncConfig::default()
            .with_timeout(Duration::from_millis(500))
            .with_poll_interval(Duration::MAX);
        assert_eq!(sync.timeout(), Duration::from_secs(1));
        assert_eq!(sync.poll_interval_ms, u64::MAX);

        let sync = SyncConfig::default().with_timeout(Duration::from_millis(2_001));
        assert_eq!(sync.timeout(), Duration::from_secs(3));
        let sync = SyncConfig::default().with_timeout(Duration::from_secs(4));
        assert_eq!(sync.timeout(), Duration::from_secs(4));
    }

    #[test]
    fn test_invalid_agent_url() {
        let config = ClientConfig::new("not a url");
        assert!(matches!(config.http_config(), Err(TransportError::Url(_))));
    }
}
