//! Response cache subsystem.
//!
//! # Responsibilities
//! - Look up stored responses by request URL
//! - Store fresh network responses for later cache-then-network calls
//!
//! # Design Decisions
//! - Lookups never fail the request; callers treat errors as a miss
//! - Entries keep the raw body text and parse on read

pub mod memory;

pub use memory::MemoryCache;

use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::http::ResponseResult;

/// Errors raised while reading or writing the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed cache entry: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A stored response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    /// Body text as received.
    pub body: String,
    /// Storage time, seconds since epoch.
    pub stored_at: u64,
}

impl CachedResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            stored_at: now_secs(),
        }
    }

    /// Capture a normalized response.
    pub fn from_result(result: &ResponseResult) -> Self {
        Self::new(result.status, result.body.to_string())
    }

    /// Parse the stored body.
    pub fn json(&self) -> Result<Value, CacheError> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&self.body)?)
    }

    pub fn to_result(&self) -> Result<ResponseResult, CacheError> {
        Ok(ResponseResult::new(self.status, self.json()?))
    }

    pub fn age_secs(&self) -> u64 {
        now_secs().saturating_sub(self.stored_at)
    }
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Response cache keyed by request URL.
pub trait ResponseCache: Send + Sync + 'static {
    fn lookup(&self, key: &str) -> BoxFuture<'static, Result<Option<CachedResponse>, CacheError>>;

    fn store(&self, _key: &str, _response: CachedResponse) -> BoxFuture<'static, Result<(), CacheError>> {
        future::ready(Ok(())).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cached_response_parsing() {
        let entry = CachedResponse::new(200, r#"{"cached": true}"#);
        assert_eq!(entry.to_result().unwrap(), ResponseResult::new(200, json!({"cached": true})));

        let empty = CachedResponse::new(204, "");
        assert_eq!(empty.json().unwrap(), Value::Null);

        let broken = CachedResponse::new(200, "{not json");
        assert!(matches!(broken.json(), Err(CacheError::Malformed(_))));
    }

    #[test]
    fn test_from_result_round_trips_body() {
        let result = ResponseResult::new(200, json!({"items": [1, 2]}));
        let entry = CachedResponse::from_result(&result);
        assert_eq!(entry.to_result().unwrap(), result);
        assert!(entry.age_secs() <= 1);
    }
}
