//! Pooled connection and its repair state machine.
//!
//! # States
//! ```text
//! Healthy → Failing: any transport error during an exchange or heartbeat
//! Failing → Healthy: `reconnect` with a fresh transport (only on checkout)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::body::Bytes;
use axum::http::Request;

use crate::detection::{DetectionContext, DetectionRequest, DetectionResult, Transport, TransportError};

/// Global atomic counter for connection IDs.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Healthy,
    /// Transport observed broken; repaired on next checkout.
    Failing,
}

/// One transport owned by the pool, plus its failure state.
#[derive(Debug)]
pub struct PooledConnection<T> {
    id: ConnectionId,
    transport: T,
    state: ConnectionState,
    created_at: Instant,
    reconnects: u64,
}

impl<T: Transport> PooledConnection<T> {
    pub fn new(transport: T) -> Self {
        Self {
            id: ConnectionId::new(),
            transport,
            state: ConnectionState::Healthy,
            created_at: Instant::now(),
            reconnects: 0,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_failing(&self) -> bool {
        self.state == ConnectionState::Failing
    }

    pub fn mark_failing(&mut self) {
        self.state = ConnectionState::Failing;
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Times the transport has been replaced.
    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub async fn detect_request_in_ctx(
        &mut self,
        ctx: &mut DetectionContext,
    ) -> Result<DetectionResult, TransportError> {
        let result = self.transport.detect_request_in_ctx(ctx).await;
        self.observe(result)
    }

    pub async fn detect_response_in_ctx(
        &mut self,
        ctx: &mut DetectionContext,
    ) -> Result<DetectionResult, TransportError> {
        let result = self.transport.detect_response_in_ctx(ctx).await;
        self.observe(result)
    }

    pub async fn detect(
        &mut self,
        ctx: &mut DetectionContext,
    ) -> Result<(DetectionResult, DetectionResult), TransportError> {
        let result = self.transport.detect(ctx).await;
        self.observe(result)
    }

    pub async fn detect_http_request(
        &mut self,
        req: &Request<Bytes>,
    ) -> Result<DetectionResult, TransportError> {
        let result = self.transport.detect_http_request(req).await;
        self.observe(result)
    }

    pub async fn detect_request(
        &mut self,
        req: &dyn DetectionRequest,
    ) -> Result<DetectionResult, TransportError> {
        let result = self.transport.detect_request(req).await;
        self.observe(result)
    }

    pub async fn heartbeat(&mut self) -> Result<(), TransportError> {
        let result = self.transport.heartbeat().await;
        self.observe(result)
    }

    /// Swap in a fresh transport, closing the old one, and clear the failing flag.
    pub async fn reconnect(&mut self, transport: T) {
        let mut old = std::mem::replace(&mut self.transport, transport);
        if let Err(e) = old.close().await {
            tracing::debug!(connection_id = %self.id, error = %e, "Error closing replaced transport");
        }
        self.state = ConnectionState::Healthy;
        self.reconnects += 1;
    }

    pub async fn close(&mut self) {
        if let Err(e) = self.transport.close().await {
            tracing::debug!(connection_id = %self.id, error = %e, "Error closing transport");
        }
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }

    fn observe<R>(&mut self, result: Result<R, TransportError>) -> Result<R, TransportError> {
        if let Err(e) = &result {
            if self.state == ConnectionState::Healthy {
                tracing::debug!(connection_id = %self.id, error = %e, "Connection marked failing");
            }
            self.state = ConnectionState::Failing;
        }
        result
    }
}
