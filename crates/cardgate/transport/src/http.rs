//! `reqwest` based transport

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::{Endpoint, Method, Request, RestError, Transport, TransportError};

/// Header carrying the distribution service API key
const API_KEY_HEADER: &str = "apikey";

/// Configuration for [`HttpTransport`]
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL of the local agent API (including its version prefix)
    pub agent_url: Url,

    /// Base URL of the distribution service API
    pub distribution_url: Option<Url>,

    /// API key sent to the distribution service
    pub api_key: Option<String>,

    /// Per-request timeout
    pub timeout: Duration,

    /// Accept the agent's self-signed certificate
    pub accept_invalid_agent_certs: bool,
}

impl HttpConfig {
    /// Create a configuration for the given agent URL
    pub const fn new(agent_url: Url) -> Self {
        Self {
            agent_url,
            distribution_url: None,
            api_key: None,
            timeout: Duration::from_secs(30),
            accept_invalid_agent_certs: true,
        }
    }

    /// Set the distribution service URL
    pub fn with_distribution_url(mut self, url: Url) -> Self {
        self.distribution_url = Some(url);
        self
    }

    /// Set the distribution service API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the per-request timeout
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set whether the agent's certificate is verified
    pub const fn with_accept_invalid_agent_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_agent_certs = accept;
        self
    }
}

/// Transport speaking JSON over HTTP(S)
///
/// Two clients are kept so that relaxed certificate checks for the local
/// agent never apply to the remote service.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    agent: reqwest::Client,
    remote: reqwest::Client,
    config: HttpConfig,
}

impl HttpTransport {
    /// Create a new transport
    pub fn new(config: HttpConfig) -> Result<Self, TransportError> {
        let agent = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_agent_certs)
            .build()
            .map_err(|source| TransportError::Http {
                endpoint: Endpoint::Agent,
                source,
            })?;
        let remote = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| TransportError::Http {
                endpoint: Endpoint::Distribution,
                source,
            })?;

        Ok(Self {
            agent,
            remote,
            config,
        })
    }

    /// The active configuration
    pub const fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn url_for(&self, endpoint: Endpoint, path: &str) -> Result<Url, TransportError> {
        let base = match endpoint {
            Endpoint::Agent => &self.config.agent_url,
            Endpoint::Distribution => self
                .config
                .distribution_url
                .as_ref()
                .ok_or(TransportError::NotConfigured(endpoint))?,
        };
        // Join by concatenation; `Url::join` would drop the version prefix of the base.
        let joined = format!("{}{}", base.as_str().trim_end_matches('/'), path);
        Ok(Url::parse(&joined)?)
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Value, TransportError> {
        let endpoint = request.endpoint();
        let url = self.url_for(endpoint, request.path())?;
        debug!(%request, "sending request");

        let client = match endpoint {
            Endpoint::Agent => &self.agent,
            Endpoint::Distribution => &self.remote,
        };
        let mut builder = client.request(request.method().into(), url);
        if !request.query().is_empty() {
            builder = builder.query(request.query());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }
        if let Some(token) = request.bearer() {
            builder = builder.bearer_auth(token);
        }
        if endpoint == Endpoint::Distribution {
            if let Some(api_key) = &self.config.api_key {
                builder = builder.header(API_KEY_HEADER, api_key);
            }
        }

        let http_error = |source| TransportError::Http { endpoint, source };
        let response = builder.send().await.map_err(http_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(http_error)?;
        trace!(%status, len = body.len(), "received response");

        if !status.is_success() {
            return Err(RestError::from_response(status.as_u16(), &body).into());
        }
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }
}
