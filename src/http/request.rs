//! Outgoing request construction.
//!
//! # Responsibilities
//! - Classify methods into query (GET, DELETE) and payload (POST, PUT, PATCH)
//! - Encode query data as an order-preserving query string
//! - Serialize payload data as the JSON body
//! - Attach default headers, pass-through options and a request ID

use std::collections::BTreeMap;
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ClientConfig;

/// Structured request data. Key order is insertion order.
pub type Payload = serde_json::Map<String, Value>;

/// Characters `encodeURIComponent` leaves untouched, besides alphanumerics.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// How a method carries its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// Data travels in the query string.
    Query,
    /// Data travels in the body.
    Payload,
}

/// Supported REST methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Delete,
    Post,
    Put,
    Patch,
}

impl Method {
    pub fn kind(&self) -> MethodKind {
        match self {
            Method::Get | Method::Delete => MethodKind::Query,
            Method::Post | Method::Put | Method::Patch => MethodKind::Payload,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Delete => "DELETE",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method name not in the supported set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported method '{0}'")]
pub struct UnsupportedMethod(pub String);

impl FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Method::Get),
            "delete" => Ok(Method::Delete),
            "post" => Ok(Method::Post),
            "put" => Ok(Method::Put),
            "patch" => Ok(Method::Patch),
            _ => Err(UnsupportedMethod(s.to_string())),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Delete => reqwest::Method::DELETE,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
        }
    }
}

/// A fully built request, ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub url: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    /// Transport pass-through options.
    pub options: BTreeMap<String, Value>,
    pub request_id: Uuid,
}

impl RequestSpec {
    /// Build the request for `resource` from the client defaults.
    pub fn build(
        config: &ClientConfig,
        resource: &str,
        method: Method,
        data: Option<&Payload>,
    ) -> Result<Self, serde_json::Error> {
        let body = create_payload(method, data)
            .map(serde_json::to_string)
            .transpose()?;

        Ok(Self {
            url: format!("{}/{}", config.base_url, build_url(resource, method, data)),
            method,
            headers: config.headers.clone(),
            body,
            options: config.options.clone(),
            request_id: Uuid::new_v4(),
        })
    }
}

fn non_empty(data: Option<&Payload>) -> Option<&Payload> {
    data.filter(|d| !d.is_empty())
}

/// The data to send as body, if `method` carries one.
pub fn create_payload(method: Method, data: Option<&Payload>) -> Option<&Payload> {
    match method.kind() {
        MethodKind::Payload => non_empty(data),
        MethodKind::Query => None,
    }
}

fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

/// Render a value as JavaScript string conversion would.
///
/// Arrays join their elements with commas and leave null elements empty.
fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => {
                format!("{}", f as i128)
            }
            _ => n.to_string(),
        },
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => query_value(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Encode `data` as `key=value` pairs joined by `&`.
pub fn build_query_string(data: &Payload) -> String {
    data.iter()
        .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(&query_value(value))))
        .collect::<Vec<_>>()
        .join("&")
}

/// Append the query string to `resource` for query methods with data.
pub fn build_url(resource: &str, method: Method, data: Option<&Payload>) -> String {
    match (method.kind(), non_empty(data)) {
        (MethodKind::Query, Some(data)) => format!("{}?{}", resource, build_query_string(data)),
        _ => resource.to_string(),
    }
}
