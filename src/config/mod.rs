//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DetectorConfig (validated)
//!     → Pool::from_config / HealthCheckService::new
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → Pool::spawn_config_reload applies the health_check section
//! ```
//!
//! # Design Decisions
//! - Pool size and address are fixed for the lifetime of a pool
//! - Health check settings can change at runtime
//! - All fields have defaults to allow minimal configs

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::DetectorConfig;
pub use schema::HealthCheckConfig;
pub use schema::HealthCheckProtocol;
pub use schema::ObservabilityConfig;
pub use schema::PoolConfig;
