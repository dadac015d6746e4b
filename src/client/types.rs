//! Client outcome and error types.

use serde_json::Value;
use thiserror::Error;

use crate::breaker::Classify;
use crate::http::{ResponseResult, TransportError, TransportResponse};

/// Status reported for transport-level failures.
pub const TRANSPORT_FAILURE_STATUS: u16 = 500;

/// Errors returned by [`ApiClient::fetch`](crate::client::ApiClient::fetch).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Status >= 500, or a transport failure reported as 500
    #[error("downstream failure (status {})", .0.status)]
    DownstreamFailure(ResponseResult),

    /// Status in 400..500
    #[error("client error (status {})", .0.status)]
    ClientError(ResponseResult),

    /// Any other status besides 200
    #[error("unsuccessful response (status {})", .0.status)]
    Unsuccessful(ResponseResult),

    /// Breaker is open, nothing was sent
    #[error("{message}")]
    BreakerOpen { message: String },

    #[error("failed to serialize request payload: {0}")]
    Payload(String),

    /// Neither the cache nor the network produced an answer
    #[error("request abandoned before any source answered")]
    Abandoned,
}

impl FetchError {
    /// Classify a non-200 result.
    pub fn rejection(result: ResponseResult) -> Self {
        match result.status {
            s if s >= 500 => FetchError::DownstreamFailure(result),
            400..=499 => FetchError::ClientError(result),
            _ => FetchError::Unsuccessful(result),
        }
    }

    pub(crate) fn transport(err: &TransportError) -> Self {
        FetchError::DownstreamFailure(ResponseResult::new(
            TRANSPORT_FAILURE_STATUS,
            Value::String(err.to_string()),
        ))
    }

    /// The `{body, status}` carried by a rejection, if any.
    pub fn response(&self) -> Option<&ResponseResult> {
        match self {
            FetchError::DownstreamFailure(r) | FetchError::ClientError(r) | FetchError::Unsuccessful(r) => Some(r),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.response().map(|r| r.status)
    }

    pub fn is_breaker_open(&self) -> bool {
        matches!(self, FetchError::BreakerOpen { .. })
    }
}

/// Result of one fetch, also what event listeners receive.
pub type Outcome = Result<ResponseResult, FetchError>;

/// Failure of the breaker-wrapped send.
#[derive(Debug)]
pub enum SendFailure {
    /// No response was received.
    Transport(TransportError),
    /// A response arrived with an error status (>= 400).
    Status(TransportResponse),
}

impl Classify for SendFailure {
    fn status(&self) -> u16 {
        match self {
            SendFailure::Transport(_) => TRANSPORT_FAILURE_STATUS,
            SendFailure::Status(response) => response.status,
        }
    }
}

impl std::fmt::Display for SendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendFailure::Transport(e) => write!(f, "{}", e),
            SendFailure::Status(r) => write!(f, "status {}", r.status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_classification() {
        let err = FetchError::rejection(ResponseResult::new(503, Value::Null));
        assert!(matches!(err, FetchError::DownstreamFailure(_)));
        assert_eq!(err.status(), Some(503));

        let err = FetchError::rejection(ResponseResult::new(404, Value::Null));
        assert!(matches!(err, FetchError::ClientError(_)));
        assert_eq!(err.to_string(), "client error (status 404)");

        let err = FetchError::rejection(ResponseResult::new(302, Value::Null));
        assert!(matches!(err, FetchError::Unsuccessful(_)));
    }

    #[test]
    fn test_transport_failure_maps_to_500() {
        let err = FetchError::transport(&TransportError::Timeout);
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.response().unwrap().body, Value::String("request timed out".to_string()));
        assert!(SendFailure::Transport(TransportError::Timeout).is_countable());
        assert!(!SendFailure::Status(TransportResponse::new(404, "")).is_countable());
    }
}
