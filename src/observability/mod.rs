//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pool, heartbeat and health checker produce:
//!     → tracing events (structured fields, no formatting in hot paths)
//!     → metrics.rs (counters and gauges through the `metrics` facade)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, pretty or JSON)
//!     → Whatever metrics recorder the host application installs
//! ```
//!
//! # Design Decisions
//! - The library never installs a metrics exporter itself
//! - Subscriber setup is opt-in so embedding applications keep control

pub mod logging;
pub mod metrics;
