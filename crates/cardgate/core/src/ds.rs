//! Typed client for the distribution service API

use std::sync::Arc;

use cardgate_transport::{Endpoint, Request, RestError, Transport, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;
use url::Url;

use crate::types::{DeviceResponse, DeviceSyncRequest, PlatformInfo};

const SYSTEM_STATUS: &str = "/system/status";
const JWT_ISSUE: &str = "/security/jwt/issue";
const JWT_REFRESH: &str = "/security/jwt/refresh";
const PUBLIC_KEY: &str = "/security/keys/public";
const DEVICES: &str = "/devices";
const DOWNLOAD: &str = "/download/gcl";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct PublicKeyResponse {
    #[serde(alias = "pubkey", alias = "publicKey")]
    key: String,
}

#[derive(Debug, Deserialize)]
struct DownloadPathResponse {
    path: String,
}

/// Installer download link for the host platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLink {
    pub url: String,
}

/// Client for the distribution service endpoints used by the orchestrator
#[derive(Debug, Clone)]
pub struct DistributionClient {
    transport: Arc<dyn Transport>,
    base_url: Option<Url>,
    api_key: Option<String>,
}

impl DistributionClient {
    /// Create a client
    ///
    /// `base_url` is the service origin download paths are resolved
    /// against; `api_key` is appended to download links.
    pub fn new(transport: Arc<dyn Transport>, base_url: Option<Url>, api_key: Option<String>) -> Self {
        Self {
            transport,
            base_url,
            api_key,
        }
    }

    pub async fn system_status(&self) -> Result<Value, TransportError> {
        self.transport
            .send(Request::get(Endpoint::Distribution, SYSTEM_STATUS))
            .await
    }

    pub async fn device(&self, uuid: &str) -> Result<Value, TransportError> {
        self.transport
            .send(Request::get(Endpoint::Distribution, format!("{DEVICES}/{uuid}")))
            .await
    }

    /// Request a fresh token
    pub async fn issue_token(&self) -> Result<String, TransportError> {
        let value = self
            .transport
            .send(Request::get(Endpoint::Distribution, JWT_ISSUE))
            .await?;
        Ok(serde_json::from_value::<TokenResponse>(value)?.token)
    }

    /// Exchange `current` for a fresh token
    ///
    /// Fails without contacting the service when there is no current token.
    pub async fn refresh_token(&self, current: Option<&str>) -> Result<String, TransportError> {
        let current = current.ok_or_else(|| RestError::new(412, "500", "No JWT available"))?;
        let request = Request::post(
            Endpoint::Distribution,
            JWT_REFRESH,
            json!({ "originalJWT": current }),
        );
        let value = self.transport.send(request).await?;
        Ok(serde_json::from_value::<TokenResponse>(value)?.token)
    }

    /// Public key the agent should trust
    pub async fn public_key(&self) -> Result<String, TransportError> {
        let value = self
            .transport
            .send(Request::get(Endpoint::Distribution, PUBLIC_KEY))
            .await?;
        match value {
            Value::String(key) => Ok(key),
            other => Ok(serde_json::from_value::<PublicKeyResponse>(other)?.key),
        }
    }

    /// First-time registration of a device
    #[instrument(skip_all, fields(uuid = %body.uuid))]
    pub async fn register(&self, body: &DeviceSyncRequest) -> Result<DeviceResponse, TransportError> {
        let request = Request::put(
            Endpoint::Distribution,
            format!("{DEVICES}/{}", body.uuid),
            serde_json::to_value(body)?,
        );
        Ok(serde_json::from_value(self.transport.send(request).await?)?)
    }

    /// Steady-state synchronization of a registered device
    #[instrument(skip_all, fields(uuid = %body.uuid))]
    pub async fn sync(&self, body: &DeviceSyncRequest) -> Result<DeviceResponse, TransportError> {
        let request = Request::post(
            Endpoint::Distribution,
            format!("{DEVICES}/{}", body.uuid),
            serde_json::to_value(body)?,
        );
        Ok(serde_json::from_value(self.transport.send(request).await?)?)
    }

    /// Installer download link for `platform`
    pub async fn download_link(&self, platform: &PlatformInfo) -> Result<DownloadLink, TransportError> {
        let base = self
            .base_url
            .as_ref()
            .ok_or(TransportError::NotConfigured(Endpoint::Distribution))?;
        let request = Request::post(Endpoint::Distribution, DOWNLOAD, serde_json::to_value(platform)?);
        let response: DownloadPathResponse = serde_json::from_value(self.transport.send(request).await?)?;

        let url = format!(
            "{}{}?apikey={}",
            base.as_str().trim_end_matches('/'),
            response.path,
            self.api_key.as_deref().unwrap_or_default()
        );
        Ok(DownloadLink { url })
    }
}
