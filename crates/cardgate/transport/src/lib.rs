//! Transport layer for talking to the local card agent and the remote
//! distribution service.
//!
//! This crate defines the [`Transport`] trait used by the orchestrator, the
//! [`Request`] value it sends, the structured [`RestError`] every failure is
//! reduced to, and [`HttpTransport`], a `reqwest` based implementation.
//!
//! # Examples
//!
//! ```no_run
//! # async fn run() -> Result<(), cardgate_transport::TransportError> {
//! use cardgate_transport::{Endpoint, HttpConfig, HttpTransport, Request, Transport};
//!
//! let config = HttpConfig::new("https://localhost:10443/v2".parse()?)
//!     .with_distribution_url("https://ds.example.com/v1".parse()?);
//! let transport = HttpTransport::new(config)?;
//!
//! let info = transport.send(Request::get(Endpoint::Agent, "/")).await?;
//! println!("agent info: {info}");
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod error;
mod http;
mod request;

pub use error::{RestError, TransportError};
pub use http::{HttpConfig, HttpTransport};
pub use request::{Endpoint, Method, Request};

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// A stateless request/response channel to the agent or the distribution service.
///
/// Implementations resolve with the parsed JSON body of a successful response
/// (`Value::Null` for an empty body) and reject with a [`TransportError`]
/// otherwise. Implementations never retry.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send a single request and wait for its response
    async fn send(&self, request: Request) -> Result<Value, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: Request) -> Result<Value, TransportError> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&self, request: Request) -> Result<Value, TransportError> {
        (**self).send(request).await
    }
}
