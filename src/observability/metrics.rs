//! Metrics collection.
//!
//! # Metrics
//! - `client_requests_total` (counter): normalized outcomes by method, status
//! - `client_breaker_transitions_total` (counter): state changes by breaker, from, to
//! - `client_breaker_rejections_total` (counter): short-circuited calls by breaker
//! - `client_race_settled_total` (counter): cache-then-network calls by winning source
//! - `client_cache_entries` (gauge): entries held by the in-memory cache
//!
//! Without an installed recorder every call here is a no-op.

use crate::breaker::BreakerState;

pub fn record_request(method: &'static str, status: u16) {
    metrics::counter!(
        "client_requests_total",
        "method" => method,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_breaker_transition(breaker: &str, from: BreakerState, to: BreakerState) {
    metrics::counter!(
        "client_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}

pub fn record_breaker_rejection(breaker: &str) {
    metrics::counter!("client_breaker_rejections_total", "breaker" => breaker.to_string()).increment(1);
}

pub fn record_race_settled(source: &'static str) {
    metrics::counter!("client_race_settled_total", "source" => source).increment(1);
}

pub fn record_cache_size(entries: usize) {
    metrics::gauge!("client_cache_entries").set(entries as f64);
}
