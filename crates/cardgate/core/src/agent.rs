//! Typed client for the local agent API

use std::sync::Arc;
use std::time::Duration;

use cardgate_transport::{Endpoint, Request, Transport, TransportError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::sync::Timer;
use crate::types::{AgentInfo, AgentInfoResponse, CardReader, ReaderFilter};
use crate::{Error, Result};

const INFO: &str = "/";
const READERS: &str = "/card-readers";
const ACTIVATE: &str = "/admin/activate";
const CERTIFICATE: &str = "/admin/certificate";
const CONTAINERS: &str = "/admin/containers";

/// Interval between two reader polls while waiting for a card
const CARD_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Key material reported by `GET /admin/certificate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCertificate {
    pub device: String,
    pub ssl: Option<String>,
}

// Older agents return the key as a bare string.
#[derive(Deserialize)]
#[serde(untagged)]
enum CertificateResponse {
    Legacy(String),
    Current {
        #[serde(default)]
        device: String,
        #[serde(default)]
        ssl: Option<String>,
    },
}

impl CertificateResponse {
    fn into_certificate(self) -> Option<AgentCertificate> {
        let certificate = match self {
            Self::Legacy(device) => AgentCertificate { device, ssl: None },
            Self::Current { device, ssl } => AgentCertificate { device, ssl },
        };
        (!certificate.device.trim().is_empty()).then_some(certificate)
    }
}

/// Unwrap the `{success, data}` envelope of agent responses
pub(crate) fn data<T: DeserializeOwned>(value: Value) -> std::result::Result<T, TransportError> {
    let inner = match value {
        Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or_default(),
        other => other,
    };
    Ok(serde_json::from_value(inner)?)
}

/// Client for the agent endpoints used by the orchestrator
#[derive(Debug, Clone)]
pub struct AgentClient {
    transport: Arc<dyn Transport>,
}

impl AgentClient {
    /// Create a client on top of `transport`
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Agent self-report, with capabilities resolved from its version
    #[instrument(skip(self))]
    pub async fn info(&self) -> Result<AgentInfo> {
        let response: AgentInfoResponse = self.get(INFO).await?;
        let info = AgentInfo::try_from(response)?;
        debug!(uid = %info.uid, version = %info.version, activated = info.activated, "agent info");
        Ok(info)
    }

    /// Card readers matching `filter`
    pub async fn readers(&self, filter: ReaderFilter) -> Result<Vec<CardReader>> {
        let mut request = Request::get(Endpoint::Agent, READERS);
        if let Some(inserted) = filter.card_inserted() {
            request = request.with_query("card-inserted", inserted);
        }
        Ok(data(self.transport.send(request).await?)?)
    }

    /// Single reader by identifier, including its pinpad capability
    pub async fn reader(&self, reader_id: &str) -> Result<CardReader> {
        self.get(&format!("{READERS}/{reader_id}")).await
    }

    /// Poll the readers until one has a card inserted
    ///
    /// Unreachable agents and empty reader lists are treated as "not yet"
    /// and polled again until `timeout` has elapsed.
    pub async fn wait_for_card(&self, timer: &dyn Timer, timeout: Duration) -> Result<CardReader> {
        let deadline = timer.now() + timeout;
        loop {
            timer.sleep(CARD_POLL_INTERVAL).await;
            match self.readers(ReaderFilter::All).await {
                Ok(readers) => {
                    if let Some(reader) = readers.into_iter().find(CardReader::has_card) {
                        return Ok(reader);
                    }
                }
                Err(error) => debug!(%error, "reader poll failed"),
            }
            if timer.now() >= deadline {
                return Err(Error::CardWaitTimeout(timeout));
            }
        }
    }

    /// Activate the agent with the capability token as bearer
    pub async fn activate(&self, bearer: Option<&str>) -> Result<()> {
        let request = Request::post(Endpoint::Agent, ACTIVATE, json!({})).with_bearer(bearer);
        self.transport.send(request).await?;
        Ok(())
    }

    /// Key currently held by the agent, `None` when it holds none
    pub async fn certificate(&self) -> Result<Option<AgentCertificate>> {
        let response: Option<CertificateResponse> = self.get(CERTIFICATE).await?;
        Ok(response.and_then(CertificateResponse::into_certificate))
    }

    pub async fn set_certificate(&self, public_key: &str, bearer: Option<&str>) -> Result<()> {
        let request = Request::put(Endpoint::Agent, CERTIFICATE, json!({ "certificate": public_key }))
            .with_bearer(bearer);
        self.transport.send(request).await?;
        Ok(())
    }

    /// Ask the agent to download the containers required by `jwt`
    pub async fn sync_containers(&self, jwt: &str, bearer: Option<&str>) -> Result<()> {
        let request = Request::post(Endpoint::Agent, CONTAINERS, json!({ "jwt": jwt })).with_bearer(bearer);
        self.transport.send(request).await?;
        Ok(())
    }

    /// Raw access for card plugin calls
    pub(crate) async fn send(&self, request: Request) -> std::result::Result<Value, TransportError> {
        self.transport.send(request).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.transport.send(Request::get(Endpoint::Agent, path)).await?;
        Ok(data(value)?)
    }
}
