//! Endpoint health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (service.rs):
//!     Periodic timer
//!     → probe.rs (TCP connect / HTTP GET each configured address)
//!     → Update state.rs
//!
//! State machine (state.rs):
//!     Unknown → Healthy ←→ Unhealthy
//!     With thresholds to prevent flapping
//! ```
//!
//! # Design Decisions
//! - Runs independently of pool occupancy and the heartbeat sweep
//! - Probes the endpoint directly, never through pooled connections
//! - State transitions require consecutive successes/failures
//! - Config swaps wake the loop and take effect right away

pub mod probe;
pub mod service;
pub mod state;

use std::time::Duration;

pub use service::HealthCheckService;
pub use state::{HealthCheckStats, HealthState};

/// Errors raised by the health checker and its probes.
#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("invalid health check config: {0}")]
    InvalidConfig(String),
    #[error("tcp connect failed: {0}")]
    Tcp(#[source] std::io::Error),
    #[error("http request failed: {0}")]
    Http(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid probe address: {0}")]
    InvalidAddress(String),
}
