//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! breaker, client, cache produce:
//!     → tracing events (structured fields)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, pretty or JSON)
//!     → any `metrics` recorder the host installs
//! ```

pub mod logging;
pub mod metrics;
