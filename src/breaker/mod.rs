//! Circuit breaking for asynchronous calls.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: downstream assumed down, calls fail fast
//! - Half-Open: testing if downstream recovered
//!
//! # Design Decisions
//! - One breaker per wrapped operation, state owned by the breaker value
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe in Half-Open (prevents hammering recovering downstream)
//! - Only failures classified with status >= 500 count; client errors pass through
//! - Grace period is checked lazily on each call, no timers

mod circuit;
mod null;
mod state;

pub use circuit::{wrap, BreakerBuilder, CircuitBreaker};
pub use null::NullBreaker;
pub use state::{BreakerRuntime, BreakerState, Transition};

use futures_util::future::BoxFuture;
use thiserror::Error;

/// Failure with an associated response status.
///
/// Transport-level failures without a response should report 500.
pub trait Classify {
    fn status(&self) -> u16;

    /// Whether this failure signals downstream unavailability.
    fn is_countable(&self) -> bool {
        self.status() >= 500
    }
}

/// Errors returned by a guarded call.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// Breaker is open, the operation was not invoked
    #[error("{message}")]
    Open { message: String },

    /// The wrapped operation failed
    #[error("{0}")]
    Failed(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// The operation's own error, if it ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Failed(e) => Some(e),
            BreakerError::Open { .. } => None,
        }
    }
}

/// A breaker was constructed without a required input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid argument: {0}")]
pub struct InvalidArgument(pub &'static str);

/// Uniform calling interface over [`CircuitBreaker`] and [`NullBreaker`].
pub trait Gate<A>: Send + Sync {
    type Output;
    type Error;

    fn call(&self, args: A) -> BoxFuture<'_, Result<Self::Output, BreakerError<Self::Error>>>;

    /// Current state, or `None` for gates that keep no state.
    fn state(&self) -> Option<BreakerState> {
        None
    }
}
