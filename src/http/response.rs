//! Response normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status the client treats as success.
pub const SUCCESS_STATUS: u16 = 200;

/// Raw response produced by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Parsed body. See [`parse_body`].
    pub fn json(&self) -> Value {
        parse_body(&self.body)
    }
}

/// Normalized outcome of a request: parsed body plus status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseResult {
    pub body: Value,
    pub status: u16,
}

impl ResponseResult {
    pub fn new(status: u16, body: Value) -> Self {
        Self { body, status }
    }

    pub fn is_success(&self) -> bool {
        self.status == SUCCESS_STATUS
    }
}

impl From<&TransportResponse> for ResponseResult {
    fn from(response: &TransportResponse) -> Self {
        Self::new(response.status, response.json())
    }
}

/// Parse a response body as JSON.
///
/// Empty bodies become `null`; bodies that are not JSON are kept as text.
pub fn parse_body(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}
