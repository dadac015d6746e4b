//! Resilient REST client library.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                    ApiClient                     │
//!     fetch(resource,    │  ┌─────────┐    ┌────────────┐    ┌───────────┐  │
//!       method, data) ───┼─▶│  http   │───▶│  breaker   │───▶│ transport │──┼──▶ REST API
//!                        │  │ request │    │ gate       │    │ (reqwest) │  │
//!                        │  └─────────┘    └────────────┘    └─────┬─────┘  │
//!                        │                                         │        │
//!     Outcome ◀──────────┼── normalize ◀── status handlers ◀───────┘        │
//!                        │       ▲                                          │
//!                        │       │ cache-then-network                       │
//!                        │  ┌────┴────┐         ┌──────────────┐            │
//!                        │  │  cache  │         │   events     │──▶ listeners
//!                        │  └─────────┘         └──────────────┘            │
//!                        │                                                  │
//!                        │  ┌────────────────────────────────────────────┐  │
//!                        │  │ Cross-cutting: config, observability       │  │
//!                        │  └────────────────────────────────────────────┘  │
//!                        └──────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod breaker;
pub mod client;
pub mod http;

// Supporting subsystems
pub mod cache;
pub mod config;
pub mod observability;

pub use breaker::{BreakerError, BreakerState, CircuitBreaker, NullBreaker};
pub use cache::MemoryCache;
pub use client::{ApiClient, FetchError, Outcome};
pub use config::schema::ClientConfig;
pub use http::{Method, Payload, ReqwestTransport};
