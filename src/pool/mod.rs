//! Connection pool subsystem.
//!
//! # Data Flow
//! ```text
//! Checkout (manager.rs):
//!     acquire()
//!     → Grow to pool size if below it (socket factory, serialized)
//!     → Pop from idle queue (waits while all connections are out)
//!     → Reconnect if failing
//!     → Lease handed to caller (lease.rs)
//!
//! Return:
//!     Lease dropped / Pool::release
//!     → Push onto idle queue (never blocks)
//!
//! Heartbeat (heartbeat.rs):
//!     Timer tick
//!     → Drain idle connections present at that instant
//!     → Ping each healthy one, mark failures
//!     → Push all of them back
//! ```
//!
//! # Design Decisions
//! - The bounded idle queue is both the free-list and the admission gate
//! - Connections are repaired only on checkout, never while idle
//! - Connections hold no reference back to the pool
//! - Factory and error hook live under one read/write lock so replacement
//!   waits for in-flight factory calls

pub mod connection;
pub mod heartbeat;
pub mod lease;
pub mod manager;

pub use connection::{ConnectionId, ConnectionState, PooledConnection};
pub use heartbeat::{SweepReport, DEFAULT_HEARTBEAT_INTERVAL, HEARTBEAT_INTERVAL_ENV};
pub use lease::Lease;
pub use manager::{Pool, PoolBuilder, PoolStatus};
