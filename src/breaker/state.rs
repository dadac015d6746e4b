//! Breaker state machine bookkeeping.
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= threshold
//! Open → HalfOpen: first call after the grace period (that call is the probe)
//! HalfOpen → Closed: probe succeeds
//! HalfOpen → Open: countable probe failure (count is not reset first)
//! Open/HalfOpen → Closed: any success
//! ```

use std::time::Duration;

use tokio::time::Instant;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakerState {
    /// Normal operation, calls pass through
    Closed,
    /// Downstream assumed down, calls fail fast
    Open,
    /// Testing if downstream recovered, one probe allowed
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change, reported for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: BreakerState,
    pub to: BreakerState,
}

/// Decision taken for one call before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// Forward the call.
    Pass,
    /// Forward the call as the single half-open probe.
    Probe { token: u64, transition: Option<Transition> },
    /// Short-circuit the call.
    Reject,
}

/// Mutable breaker state, owned by exactly one breaker.
#[derive(Debug, Clone)]
pub struct BreakerRuntime {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Token of the probe currently in flight.
    probe: Option<u64>,
    next_probe: u64,
}

impl Default for BreakerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakerRuntime {
    pub fn new() -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe: None,
            next_probe: 0,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// When the breaker last opened. Meaningful only while Open.
    pub fn opened_at(&self) -> Option<Instant> {
        self.opened_at
    }

    pub fn probe_in_flight(&self) -> bool {
        self.probe.is_some()
    }

    pub(crate) fn admit(&mut self, grace_period: Duration, now: Instant) -> Admission {
        match self.state {
            BreakerState::Closed => Admission::Pass,
            BreakerState::HalfOpen => {
                if self.probe.is_some() {
                    Admission::Reject
                } else {
                    Admission::Probe { token: self.start_probe(), transition: None }
                }
            }
            BreakerState::Open => match self.opened_at {
                Some(opened_at) if now.saturating_duration_since(opened_at) > grace_period => {
                    self.state = BreakerState::HalfOpen;
                    Admission::Probe {
                        token: self.start_probe(),
                        transition: Some(Transition {
                            from: BreakerState::Open,
                            to: BreakerState::HalfOpen,
                        }),
                    }
                }
                _ => Admission::Reject,
            },
        }
    }

    pub(crate) fn record_success(&mut self) -> Option<Transition> {
        if self.state == BreakerState::Closed {
            return None;
        }

        let from = self.state;
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.probe = None;
        Some(Transition { from, to: BreakerState::Closed })
    }

    pub(crate) fn record_failure(
        &mut self,
        countable: bool,
        threshold: u32,
        now: Instant,
    ) -> Option<Transition> {
        if !countable {
            return None;
        }

        match self.state {
            BreakerState::Closed | BreakerState::HalfOpen => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures >= threshold {
                    let from = self.state;
                    self.state = BreakerState::Open;
                    self.opened_at = Some(now);
                    return Some(Transition { from, to: BreakerState::Open });
                }
                None
            }
            // Stragglers issued before the breaker opened.
            BreakerState::Open => None,
        }
    }

    /// Free the probe slot if `token` still holds it.
    pub(crate) fn release_probe(&mut self, token: u64) {
        if self.probe == Some(token) {
            self.probe = None;
        }
    }

    fn start_probe(&mut self) -> u64 {
        let token = self.next_probe;
        self.next_probe = self.next_probe.wrapping_add(1);
        self.probe = Some(token);
        token
    }
}
