//! Client-side connection pool for a detection service.

pub mod config;
pub mod detection;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod pool;

pub use config::schema::DetectorConfig;
pub use detection::{
    dial, socket_factory, DetectionContext, DetectionRequest, DetectionResult, ErrorHook,
    SocketFactory, Transport, TransportError,
};
pub use error::PoolError;
pub use health::{HealthCheckService, HealthCheckStats, HealthState};
pub use lifecycle::Shutdown;
pub use pool::{Lease, Pool, PoolBuilder, PoolStatus, PooledConnection, SweepReport};
