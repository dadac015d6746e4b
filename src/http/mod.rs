//! HTTP request/response handling subsystem.
//!
//! # Data Flow
//! ```text
//! (resource, method, data)
//!     → request.rs (URL, query string, JSON body, headers, request ID)
//!     → transport.rs (send over the wire)
//!     → response.rs (status + parsed body)
//! ```

pub mod request;
pub mod response;
pub mod transport;

pub use request::{build_query_string, build_url, create_payload, Method, MethodKind, Payload, RequestSpec};
pub use response::{ResponseResult, TransportResponse};
pub use transport::{ReqwestTransport, Transport, TransportError};
