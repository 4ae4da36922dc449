//! Request description shared by every transport

use std::fmt;

use derive_more::Display;
use serde_json::Value;

/// Which remote party a request is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Endpoint {
    /// The locally installed card agent
    #[display("agent")]
    Agent,
    /// The remote distribution service
    #[display("distribution service")]
    Distribution,
}

/// HTTP verbs used by the agent and distribution service APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Method {
    /// `GET`
    #[display("GET")]
    Get,
    /// `POST`
    #[display("POST")]
    Post,
    /// `PUT`
    #[display("PUT")]
    Put,
}

/// A single request to the agent or the distribution service
#[derive(Clone, PartialEq)]
pub struct Request {
    endpoint: Endpoint,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    bearer: Option<String>,
}

impl Request {
    /// Create a request with the given endpoint, method and path
    ///
    /// The path is relative to the endpoint's base URL and should start with `/`.
    pub fn new(endpoint: Endpoint, method: Method, path: impl Into<String>) -> Self {
        Self {
            endpoint,
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
        }
    }

    /// Create a `GET` request
    pub fn get(endpoint: Endpoint, path: impl Into<String>) -> Self {
        Self::new(endpoint, Method::Get, path)
    }

    /// Create a `POST` request with a JSON body
    pub fn post(endpoint: Endpoint, path: impl Into<String>, body: Value) -> Self {
        Self::new(endpoint, Method::Post, path).with_body(body)
    }

    /// Create a `PUT` request with a JSON body
    pub fn put(endpoint: Endpoint, path: impl Into<String>, body: Value) -> Self {
        Self::new(endpoint, Method::Put, path).with_body(body)
    }

    /// Set the JSON body
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Append a query parameter
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a bearer token, if one is available
    pub fn with_bearer(mut self, token: Option<&str>) -> Self {
        self.bearer = token.map(str::to_owned);
        self
    }

    /// The addressed endpoint
    pub const fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// The HTTP method
    pub const fn method(&self) -> Method {
        self.method
    }

    /// The path relative to the endpoint base URL
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters in insertion order
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// The JSON body, if any
    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// The bearer token, if any
    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }
}

// Bodies may carry encrypted PINs and the bearer is a live token; keep both out of logs.
impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("endpoint", &self.endpoint)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("has_body", &self.body.is_some())
            .field("has_bearer", &self.bearer.is_some())
            .finish()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.method, self.endpoint, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_debug_output_hides_secrets() {
        let request = Request::post(
            Endpoint::Agent,
            "/plugins/emv/reader-1/verify-pin",
            json!({ "pin": "c2VjcmV0" }),
        )
        .with_bearer(Some("eyJhbGciOi.secret.token"));

        let debug = format!("{request:?}");
        assert!(!debug.contains("c2VjcmV0"));
        assert!(!debug.contains("eyJhbGciOi"));
        assert!(debug.contains("has_bearer: true"));
    }

    #[test]
    fn test_display_is_compact() {
        let request = Request::get(Endpoint::Distribution, "/system/status");
        assert_eq!(request.to_string(), "GET distribution service /system/status");
    }
}
