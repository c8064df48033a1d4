//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Pool construction:
//!     Validate → Start health-check loop → Spawn heartbeat task
//!
//! Pool close (shutdown.rs):
//!     Trigger signal → Heartbeat task exits → Drain connections → Stop health checks
//! ```
//!
//! # Design Decisions
//! - Every background loop is owned by one pool instance, never global
//! - Shutdown is a one-shot broadcast; late subscribers see it through `is_triggered`

pub mod shutdown;

pub use shutdown::Shutdown;
