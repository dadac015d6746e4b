//! Request orchestration.
//!
//! # Data Flow
//! ```text
//! fetch(resource, method, data, event)
//!     → http::RequestSpec (URL, query/body, default headers)
//!     → cache_then_network?  ── yes ──► race.rs (cache task ∥ network task)
//!     │                                     │
//!     └── no ───────────────────────────────┤
//!                                           ▼
//!     → breaker gate (CircuitBreaker or NullBreaker)
//!     → Transport::send
//!     → status handler, normalize to ResponseResult / FetchError
//! ```

pub mod api;
pub mod events;
mod race;
pub mod status;
pub mod types;

pub use api::{ApiClient, ApiClientBuilder};
pub use events::EventRegistry;
pub use status::StatusHandlers;
pub use types::{FetchError, Outcome, SendFailure};
