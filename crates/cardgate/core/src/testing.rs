//! Test doubles shared by the unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use cardgate_transport::{Endpoint, Method, Request, RestError, Transport, TransportError};
use jsonwebtoken::{EncodingKey, Header};
use parking_lot::Mutex;
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use serde_json::{Value, json};

type Key = (Endpoint, Method, String);

#[derive(Debug, Default)]
struct Script {
    responses: HashMap<Key, VecDeque<Result<Value, RestError>>>,
    requests: Vec<Request>,
}

/// Transport answering from a script and recording every request
///
/// Responses for the same endpoint, method and path are returned in order;
/// the last one keeps being returned once the others are used up.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(
        self,
        endpoint: Endpoint,
        method: Method,
        path: &str,
        response: Result<Value, RestError>,
    ) -> Self {
        self.script
            .lock()
            .responses
            .entry((endpoint, method, path.to_string()))
            .or_default()
            .push_back(response);
        self
    }

    pub(crate) fn on_get(self, endpoint: Endpoint, path: &str, response: Result<Value, RestError>) -> Self {
        self.on(endpoint, Method::Get, path, response)
    }

    pub(crate) fn on_post(self, endpoint: Endpoint, path: &str, response: Result<Value, RestError>) -> Self {
        self.on(endpoint, Method::Post, path, response)
    }

    pub(crate) fn on_put(self, endpoint: Endpoint, path: &str, response: Result<Value, RestError>) -> Self {
        self.on(endpoint, Method::Put, path, response)
    }

    pub(crate) fn shared(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    /// Every request sent so far, in order
    pub(crate) fn requests(&self) -> Vec<Request> {
        self.script.lock().requests.clone()
    }

    /// Number of requests sent to `path` with `method`
    pub(crate) fn count(&self, method: Method, path: &str) -> usize {
        self.script
            .lock()
            .requests
            .iter()
            .filter(|request| request.method() == method && request.path() == path)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: Request) -> Result<Value, TransportError> {
        let mut script = self.script.lock();
        let key = (request.endpoint(), request.method(), request.path().to_string());
        script.requests.push(request);

        let response = match script.responses.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        match response {
            Some(response) => response.map_err(TransportError::from),
            None => Err(RestError::new(404, "404", format!("no scripted response for {key:?}")).into()),
        }
    }
}

/// Wrap `data` in the agent response envelope
pub(crate) fn agent_ok(data: Value) -> Value {
    json!({ "success": true, "data": data })
}

/// Encode a capability token carrying `claims`
pub(crate) fn token_with_claims(claims: Value) -> String {
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"cardgate-test"),
    )
    .unwrap()
}

/// Agent self-report of a v2 agent with the given containers
pub(crate) fn agent_info(activated: bool, containers: Value) -> Value {
    agent_ok(json!({
        "activated": activated,
        "managed": false,
        "uid": "device-1",
        "version": "2.1.0",
        "containers": containers
    }))
}

static TEST_KEY: LazyLock<RsaPrivateKey> = LazyLock::new(|| {
    RsaPrivateKey::new(&mut rand_v8::thread_rng(), 1024).unwrap()
});

/// RSA key pair generated once per test binary
pub(crate) fn test_key() -> RsaPrivateKey {
    TEST_KEY.clone()
}

/// The public half of [`test_key`] as SPKI PEM
pub(crate) fn test_public_pem() -> String {
    TEST_KEY
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .unwrap()
}
