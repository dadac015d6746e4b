//! Per-status side-effect handlers.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::validation::{validate_status, ValidationError};

type Handler = Arc<dyn Fn() + Send + Sync>;

/// Map from HTTP status code to a callback run when a response with that
/// status arrives. Handlers never change the outcome of the request.
#[derive(Clone, Default)]
pub struct StatusHandlers {
    handlers: HashMap<u16, Handler>,
}

impl std::fmt::Debug for StatusHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut codes: Vec<_> = self.handlers.keys().copied().collect();
        codes.sort_unstable();
        f.debug_struct("StatusHandlers").field("codes", &codes).finish()
    }
}

impl StatusHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `status`, replacing any previous one.
    pub fn register<F>(&mut self, status: u16, handler: F) -> Result<(), ValidationError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        validate_status(status)?;
        self.handlers.insert(status, Arc::new(handler));
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F>(mut self, status: u16, handler: F) -> Result<Self, ValidationError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(status, handler)?;
        Ok(self)
    }

    /// Run the handler for `status`. Returns whether one was registered.
    pub fn dispatch(&self, status: u16) -> bool {
        match self.handlers.get(&status) {
            Some(handler) => {
                tracing::debug!(status, "Running status handler");
                handler();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, status: u16) -> bool {
        self.handlers.contains_key(&status)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
