//! The API client.

use std::sync::Arc;

use crate::breaker::{BreakerError, BreakerState, CircuitBreaker, Gate, InvalidArgument};
use crate::cache::ResponseCache;
use crate::client::events::EventRegistry;
use crate::client::race;
use crate::client::status::StatusHandlers;
use crate::client::types::{FetchError, Outcome, SendFailure, TRANSPORT_FAILURE_STATUS};
use crate::config::validation::validate_config;
use crate::config::{BreakerConfig, ClientConfig, ConfigError};
use crate::http::{Method, Payload, RequestSpec, ResponseResult, Transport, TransportError, TransportResponse};
use crate::observability::metrics;

type SendGate = dyn Gate<RequestSpec, Output = TransportResponse, Error = SendFailure>;

/// Name of the breaker guarding the transport, used in logs and metrics.
const BREAKER_NAME: &str = "api";

/// REST client with optional circuit breaking and cache-then-network reads.
///
/// Cloning is cheap and clones share breaker state, cache and listeners.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    config: ClientConfig,
    gate: Box<SendGate>,
    cache: Option<Arc<dyn ResponseCache>>,
    handlers: StatusHandlers,
    pub(crate) events: EventRegistry,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.config.base_url)
            .field("breaker", &self.inner.gate.state())
            .field("cache", &self.inner.cache.is_some())
            .field("handlers", &self.inner.handlers)
            .finish()
    }
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    cache: Option<Arc<dyn ResponseCache>>,
    handlers: StatusHandlers,
}

impl ApiClientBuilder {
    pub fn transport<T: Transport>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn cache<C: ResponseCache>(mut self, cache: C) -> Self {
        self.cache = Some(Arc::new(cache));
        self
    }

    /// Run `handler` whenever a response with `status` arrives.
    pub fn status_handler<F>(mut self, status: u16, handler: F) -> Result<Self, ConfigError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.handlers.register(status, handler)?;
        Ok(self)
    }

    pub fn status_handlers(mut self, handlers: StatusHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn build(self) -> Result<ApiClient, ConfigError> {
        validate_config(&self.config).map_err(ConfigError::Validation)?;
        let transport = self
            .transport
            .ok_or(InvalidArgument("a transport must be provided"))?;
        let gate = build_gate(&self.config, transport)?;

        tracing::debug!(
            base_url = %self.config.base_url,
            breaker = self.config.circuit_breaker.is_some(),
            cache_then_network = self.config.cache_then_network,
            "API client built"
        );

        Ok(ApiClient {
            inner: Arc::new(Inner {
                config: self.config,
                gate,
                cache: self.cache,
                handlers: self.handlers,
                events: EventRegistry::new(),
            }),
        })
    }
}

/// Wrap the transport in a circuit breaker, or a pass-through gate when
/// breaking is not configured.
fn build_gate(config: &ClientConfig, transport: Arc<dyn Transport>) -> Result<Box<SendGate>, InvalidArgument> {
    let operation = move |request: RequestSpec| checked(transport.send(request));
    let builder = CircuitBreaker::builder().name(BREAKER_NAME).operation(operation);

    let gate: Box<SendGate> = match &config.circuit_breaker {
        Some(breaker) => Box::new(builder.config(breaker.clone()).build()?),
        None => Box::new(builder.config(BreakerConfig::default()).build_null()?),
    };
    Ok(gate)
}

/// Error statuses become failures so the breaker can classify them.
async fn checked(
    response: impl std::future::Future<Output = Result<TransportResponse, TransportError>>,
) -> Result<TransportResponse, SendFailure> {
    match response.await {
        Ok(response) if response.status >= 400 => Err(SendFailure::Status(response)),
        Ok(response) => Ok(response),
        Err(e) => Err(SendFailure::Transport(e)),
    }
}

impl ApiClient {
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder {
            config,
            transport: None,
            cache: None,
            handlers: StatusHandlers::new(),
        }
    }

    /// Client without a cache or status handlers.
    pub fn new<T: Transport>(config: ClientConfig, transport: T) -> Result<Self, ConfigError> {
        Self::builder(config).transport(transport).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Breaker state, `None` when breaking is not configured.
    pub fn breaker_state(&self) -> Option<BreakerState> {
        self.inner.gate.state()
    }

    /// Register a listener for network refreshes of calls tagged `event`.
    pub fn on<F>(&self, event: impl Into<String>, listener: F)
    where
        F: Fn(&Outcome) + Send + Sync + 'static,
    {
        self.inner.events.on(event, listener);
    }

    /// Request `resource` with `method`.
    ///
    /// Resolves with the response when its status is 200 and rejects with
    /// a [`FetchError`] otherwise. In cache-then-network mode a cached entry
    /// may answer first; the network result then reaches the listeners
    /// registered for `event`.
    pub async fn fetch(
        &self,
        resource: &str,
        method: Method,
        data: Option<&Payload>,
        event: Option<&str>,
    ) -> Outcome {
        let request = RequestSpec::build(&self.inner.config, resource, method, data)
            .map_err(|e| FetchError::Payload(e.to_string()))?;

        tracing::debug!(
            request_id = %request.request_id,
            method = %method,
            url = %request.url,
            "Fetching"
        );

        match (&self.inner.cache, self.inner.config.cache_then_network) {
            (Some(cache), true) => {
                race::cache_then_network(self.inner.clone(), cache.clone(), request, event.map(str::to_string)).await
            }
            _ => self.inner.send(request).await,
        }
    }
}

impl Inner {
    /// Send through the gate and normalize the outcome.
    pub(crate) async fn send(&self, request: RequestSpec) -> Outcome {
        let method = request.method;
        let request_id = request.request_id;

        match self.gate.call(request).await {
            Ok(response) | Err(BreakerError::Failed(SendFailure::Status(response))) => {
                self.normalize(method, &response)
            }
            Err(BreakerError::Failed(SendFailure::Transport(e))) => {
                tracing::warn!(%request_id, method = %method, error = %e, "Transport failure");
                metrics::record_request(method.as_str(), TRANSPORT_FAILURE_STATUS);
                Err(FetchError::transport(&e))
            }
            Err(BreakerError::Open { message }) => Err(FetchError::BreakerOpen { message }),
        }
    }

    fn normalize(&self, method: Method, response: &TransportResponse) -> Outcome {
        self.handlers.dispatch(response.status);
        metrics::record_request(method.as_str(), response.status);

        let result = ResponseResult::from(response);
        if result.is_success() {
            Ok(result)
        } else {
            Err(FetchError::rejection(result))
        }
    }
}
