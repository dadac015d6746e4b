//! Request transport.
//!
//! # Responsibilities
//! - Send a built request and return the raw response
//! - Report network-level failures (connect, timeout) as errors
//!
//! # Design Decisions
//! - Any HTTP status is a successful transport result; status handling
//!   belongs to the client
//! - Closures implement `Transport`, so tests and callers can supply their own

use std::future::Future;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use thiserror::Error;

use crate::config::TransportConfig;
use crate::http::request::RequestSpec;
use crate::http::response::TransportResponse;

/// Per-request option overriding the client timeout.
pub const TIMEOUT_OPTION: &str = "timeout_ms";

/// Network-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid request: {0}")]
    Request(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_builder() {
            TransportError::Request(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// Sends requests.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: RequestSpec) -> BoxFuture<'static, Result<TransportResponse, TransportError>>;
}

impl<F, Fut> Transport for F
where
    F: Fn(RequestSpec) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TransportResponse, TransportError>> + Send + 'static,
{
    fn send(&self, request: RequestSpec) -> BoxFuture<'static, Result<TransportResponse, TransportError>> {
        (self)(request).boxed()
    }
}

/// Transport backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone());
        if config.no_proxy {
            builder = builder.no_proxy();
        }

        let client = builder.build().map_err(TransportError::from)?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: RequestSpec) -> BoxFuture<'static, Result<TransportResponse, TransportError>> {
        execute(self.client.clone(), request).boxed()
    }
}

async fn execute(client: reqwest::Client, request: RequestSpec) -> Result<TransportResponse, TransportError> {
    let mut builder = client
        .request(request.method.into(), &request.url)
        .header("X-Request-Id", request.request_id.to_string());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(ms) = request.options.get(TIMEOUT_OPTION).and_then(|v| v.as_u64()) {
        builder = builder.timeout(Duration::from_millis(ms));
    }
    if let Some(body) = request.body {
        builder = builder.body(body);
    }

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let body = response.bytes().await?.to_vec();

    tracing::trace!(status, bytes = body.len(), "Transport response received");
    Ok(TransportResponse { status, body })
}
