//! Pool error type.

use crate::detection::TransportError;
use crate::health::HealthError;

/// Errors returned by [`crate::Pool`] operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The socket factory failed while growing the pool.
    #[error("failed to open connection: {0}")]
    Connect(#[source] TransportError),

    /// A failing connection could not be replaced on checkout.
    #[error("failed to reconnect: {0}")]
    Reconnect(#[source] TransportError),

    /// The detection exchange itself failed; the connection is now marked failing.
    #[error("detection exchange failed: {0}")]
    Exchange(#[from] TransportError),

    #[error("pool is closed")]
    Closed,

    #[error("pool size must be at least 1")]
    InvalidPoolSize,

    #[error(transparent)]
    HealthCheck(#[from] HealthError),
}
