//! Pass-through gate used when no breaker is configured.

use std::future::Future;

use futures_util::future::{BoxFuture, FutureExt};

use crate::breaker::{BreakerBuilder, BreakerError, Gate};

/// Forwards every call unchanged and keeps no state.
pub struct NullBreaker<F> {
    operation: F,
}

impl<F> std::fmt::Debug for NullBreaker<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NullBreaker").finish_non_exhaustive()
    }
}

impl<F> NullBreaker<F> {
    pub(crate) fn new(operation: F) -> Self {
        Self { operation }
    }

    pub fn builder() -> BreakerBuilder<F> {
        BreakerBuilder::default()
    }

    pub async fn call<A, Fut, T, E>(&self, args: A) -> Result<T, BreakerError<E>>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        (self.operation)(args).await.map_err(BreakerError::Failed)
    }
}

impl<A, F, Fut, T, E> Gate<A> for NullBreaker<F>
where
    A: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    type Output = T;
    type Error = E;

    fn call(&self, args: A) -> BoxFuture<'_, Result<T, BreakerError<E>>> {
        NullBreaker::call(self, args).boxed()
    }
}
