//! Circuit breaker wrapping an async operation.

use std::future::Future;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::breaker::state::{Admission, BreakerRuntime, BreakerState, Transition};
use crate::breaker::{BreakerError, Classify, Gate, InvalidArgument, NullBreaker};
use crate::config::BreakerConfig;
use crate::observability::metrics;

const DEFAULT_NAME: &str = "default";

/// Wrap `operation` in a circuit breaker.
///
/// Never fails: a zero `threshold` or `grace_period_ms` falls back to the
/// [`BreakerConfig`] default. Use [`BreakerBuilder::build`] to reject them.
pub fn wrap<F>(operation: F, config: BreakerConfig) -> CircuitBreaker<F> {
    CircuitBreaker::new(DEFAULT_NAME.to_string(), operation, with_defaults(config))
}

fn with_defaults(mut config: BreakerConfig) -> BreakerConfig {
    let defaults = BreakerConfig::default();
    if config.threshold == 0 {
        tracing::warn!(fallback = defaults.threshold, "Breaker threshold of zero replaced with default");
        config.threshold = defaults.threshold;
    }
    if config.grace_period_ms == 0 {
        tracing::warn!(
            fallback = defaults.grace_period_ms,
            "Breaker grace period of zero replaced with default"
        );
        config.grace_period_ms = defaults.grace_period_ms;
    }
    config
}

/// Builder for [`CircuitBreaker`] and [`NullBreaker`].
///
/// Both the operation and the configuration must be supplied.
pub struct BreakerBuilder<F> {
    name: String,
    operation: Option<F>,
    config: Option<BreakerConfig>,
}

impl<F> Default for BreakerBuilder<F> {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            operation: None,
            config: None,
        }
    }
}

impl<F> BreakerBuilder<F> {
    /// Name used in logs and metric labels.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn operation(mut self, operation: F) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn config(mut self, config: BreakerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(mut self) -> Result<CircuitBreaker<F>, InvalidArgument> {
        let (operation, config) = self.parts()?;
        if config.threshold == 0 {
            return Err(InvalidArgument("threshold must be greater than zero"));
        }
        if config.grace_period_ms == 0 {
            return Err(InvalidArgument("grace period must be greater than zero"));
        }
        Ok(CircuitBreaker::new(self.name, operation, config))
    }

    /// Build a pass-through gate. The configuration is required but unused.
    pub fn build_null(mut self) -> Result<NullBreaker<F>, InvalidArgument> {
        let (operation, _) = self.parts()?;
        Ok(NullBreaker::new(operation))
    }

    fn parts(&mut self) -> Result<(F, BreakerConfig), InvalidArgument> {
        match (self.operation.take(), self.config.take()) {
            (Some(operation), Some(config)) => Ok((operation, config)),
            (None, _) => Err(InvalidArgument("an async operation must be provided")),
            (_, None) => Err(InvalidArgument("breaker options must be provided")),
        }
    }
}

/// Gates calls to `F` based on its recent failure history.
pub struct CircuitBreaker<F> {
    name: String,
    operation: F,
    config: BreakerConfig,
    runtime: Mutex<BreakerRuntime>,
}

impl<F> std::fmt::Debug for CircuitBreaker<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("runtime", &*self.runtime.lock())
            .finish()
    }
}

/// Frees the half-open probe slot when the probe call ends, even if its
/// future is dropped before completing.
struct ProbeGuard<'a> {
    runtime: &'a Mutex<BreakerRuntime>,
    token: u64,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.runtime.lock().release_probe(self.token);
    }
}

impl<F> CircuitBreaker<F> {
    fn new(name: String, operation: F, config: BreakerConfig) -> Self {
        Self {
            name,
            operation,
            config,
            runtime: Mutex::new(BreakerRuntime::new()),
        }
    }

    pub fn builder() -> BreakerBuilder<F> {
        BreakerBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    pub fn state(&self) -> BreakerState {
        self.runtime.lock().state()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.runtime.lock().consecutive_failures()
    }

    /// Snapshot of the runtime state (for monitoring).
    pub fn runtime(&self) -> BreakerRuntime {
        self.runtime.lock().clone()
    }

    fn grace_period(&self) -> Duration {
        Duration::from_millis(self.config.grace_period_ms)
    }

    /// Execute the operation with circuit breaker protection.
    pub async fn call<A, Fut, T, E>(&self, args: A) -> Result<T, BreakerError<E>>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        let admission = self.runtime.lock().admit(self.grace_period(), Instant::now());

        let _probe = match admission {
            Admission::Pass => None,
            Admission::Probe { token, transition } => {
                if let Some(transition) = transition {
                    self.report(transition);
                }
                Some(ProbeGuard { runtime: &self.runtime, token })
            }
            Admission::Reject => {
                tracing::debug!(breaker = %self.name, "Circuit breaker open, failing fast");
                metrics::record_breaker_rejection(&self.name);
                return Err(BreakerError::Open {
                    message: self.config.message.clone(),
                });
            }
        };

        match (self.operation)(args).await {
            Ok(value) => {
                let transition = self.runtime.lock().record_success();
                if let Some(transition) = transition {
                    self.report(transition);
                }
                Ok(value)
            }
            Err(e) => {
                let countable = e.is_countable();
                if !countable {
                    tracing::debug!(breaker = %self.name, status = e.status(), "Failure not counted by breaker");
                }
                let transition = self
                    .runtime
                    .lock()
                    .record_failure(countable, self.config.threshold, Instant::now());
                if let Some(transition) = transition {
                    self.report(transition);
                }
                Err(BreakerError::Failed(e))
            }
        }
    }

    fn report(&self, transition: Transition) {
        match transition.to {
            BreakerState::Open => tracing::warn!(
                breaker = %self.name,
                from = %transition.from,
                failures = self.consecutive_failures(),
                grace_period_ms = self.config.grace_period_ms,
                "Circuit breaker opened"
            ),
            _ => tracing::info!(
                breaker = %self.name,
                from = %transition.from,
                to = %transition.to,
                "Circuit breaker state changed"
            ),
        }
        metrics::record_breaker_transition(&self.name, transition.from, transition.to);
    }
}

impl<A, F, Fut, T, E> Gate<A> for CircuitBreaker<F>
where
    A: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Classify + Send + 'static,
{
    type Output = T;
    type Error = E;

    fn call(&self, args: A) -> BoxFuture<'_, Result<T, BreakerError<E>>> {
        CircuitBreaker::call(self, args).boxed()
    }

    fn state(&self) -> Option<BreakerState> {
        Some(CircuitBreaker::state(self))
    }
}
