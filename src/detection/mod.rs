//! Detection exchange vocabulary.
//!
//! # Data Flow
//! ```text
//! Caller builds DetectionContext / DetectionRequest
//!     → Pool hands out a pooled connection
//!     → transport.rs (Transport impl encodes, sends, decodes)
//!     → DetectionResult back to the caller
//! ```
//!
//! # Design Decisions
//! - Wire encoding lives entirely inside `Transport` implementations
//! - The pool only moves these values between caller and transport
//! - One exchange in flight per transport

pub mod transport;

use std::net::SocketAddr;
use std::time::SystemTime;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Request, Response, Uri};
use serde::Serialize;
use uuid::Uuid;

pub use transport::{dial, socket_factory, ErrorHook, SocketFactory, Transport, TransportError};

/// Verdict returned by the detection service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Passed,
    Blocked,
}

/// Outcome of one detection exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct DetectionResult {
    pub action: Action,
    /// Status code the caller should answer with when blocked.
    pub status_code: Option<u16>,
    /// Event identifier assigned by the service, if any.
    pub event_id: Option<String>,
}

impl DetectionResult {
    pub fn passed() -> Self {
        Self::default()
    }

    pub fn blocked(status_code: u16, event_id: impl Into<String>) -> Self {
        Self {
            action: Action::Blocked,
            status_code: Some(status_code),
            event_id: Some(event_id.into()),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.action == Action::Blocked
    }
}

/// Per-transaction state shared by the request and response halves of a detection.
#[derive(Debug)]
pub struct DetectionContext {
    /// Unique transaction ID (UUID v4).
    pub id: String,
    pub remote_addr: Option<SocketAddr>,
    pub started_at: SystemTime,
    pub request: Option<Request<Bytes>>,
    pub response: Option<Response<Bytes>>,
}

impl DetectionContext {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            remote_addr: None,
            started_at: SystemTime::now(),
            request: None,
            response: None,
        }
    }

    pub fn with_request(mut self, request: Request<Bytes>) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_response(mut self, response: Response<Bytes>) -> Self {
        self.response = Some(response);
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }
}

impl Default for DetectionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Generic request abstraction accepted by [`Transport::detect_request`].
pub trait DetectionRequest: Send + Sync {
    fn method(&self) -> &Method;
    fn uri(&self) -> &Uri;
    fn headers(&self) -> &HeaderMap;
    fn body(&self) -> &[u8];

    fn remote_addr(&self) -> Option<SocketAddr> {
        None
    }
}

impl DetectionRequest for Request<Bytes> {
    fn method(&self) -> &Method {
        Request::method(self)
    }

    fn uri(&self) -> &Uri {
        Request::uri(self)
    }

    fn headers(&self) -> &HeaderMap {
        Request::headers(self)
    }

    fn body(&self) -> &[u8] {
        Request::<Bytes>::body(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_ids_are_unique() {
        let a = DetectionContext::new();
        let b = DetectionContext::new();
        assert_ne!(a.id, b.id);
        assert!(a.request.is_none());
    }

    #[test]
    fn http_request_exposes_parts() {
        let req = Request::builder()
            .method("POST")
            .uri("/login?next=/")
            .header("host", "example.com")
            .body(Bytes::from_static(b"user=admin"))
            .unwrap();

        let generic: &dyn DetectionRequest = &req;
        assert_eq!(generic.method(), &Method::POST);
        assert_eq!(generic.uri().path(), "/login");
        assert_eq!(generic.headers()["host"], "example.com");
        assert_eq!(generic.body(), b"user=admin");
        assert_eq!(generic.remote_addr(), None);
    }

    #[test]
    fn blocked_result() {
        let result = DetectionResult::blocked(403, "evt-1");
        assert!(result.is_blocked());
        assert!(!DetectionResult::passed().is_blocked());
    }
}
