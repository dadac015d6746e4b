//! Named event listeners for network refreshes.

use std::sync::Arc;

use dashmap::DashMap;

use crate::client::types::Outcome;

type Listener = Arc<dyn Fn(&Outcome) + Send + Sync>;

/// Listeners keyed by event name.
///
/// Clones share the same registry.
#[derive(Clone, Default)]
pub struct EventRegistry {
    listeners: Arc<DashMap<String, Vec<Listener>>>,
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("events", &self.listeners.len())
            .finish()
    }
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener for `event`. Listeners are never removed.
    pub fn on<F>(&self, event: impl Into<String>, listener: F)
    where
        F: Fn(&Outcome) + Send + Sync + 'static,
    {
        self.listeners
            .entry(event.into())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Invoke every listener for `event` in registration order.
    /// Returns how many ran.
    pub fn emit(&self, event: &str, outcome: &Outcome) -> usize {
        // Snapshot first: a listener may register more listeners.
        let listeners = match self.listeners.get(event) {
            Some(entry) => entry.value().clone(),
            None => return 0,
        };

        for listener in &listeners {
            listener(outcome);
        }
        listeners.len()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map(|l| l.len()).unwrap_or(0)
    }
}
