//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (pool size > 0, intervals > 0, thresholds > 0)
//! - Check probe addresses and paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DetectorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::{DetectorConfig, HealthCheckConfig, HealthCheckProtocol, PoolConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a whole configuration.
pub fn validate_config(config: &DetectorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_pool(&config.pool, &mut errors);
    check_health_check(&config.health_check, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate only the health check section (used on runtime updates).
pub fn validate_health_check(config: &HealthCheckConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_health_check(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_pool(pool: &PoolConfig, errors: &mut Vec<ValidationError>) {
    if pool.address.trim().is_empty() {
        errors.push(ValidationError::new("pool.address", "must not be empty"));
    }
    if pool.pool_size == 0 {
        errors.push(ValidationError::new("pool.pool_size", "must be at least 1"));
    }
    if pool.heartbeat_interval_secs == Some(0) {
        errors.push(ValidationError::new(
            "pool.heartbeat_interval_secs",
            "must be greater than 0",
        ));
    }
    if pool.connect_timeout_ms == Some(0) {
        errors.push(ValidationError::new(
            "pool.connect_timeout_ms",
            "must be greater than 0",
        ));
    }
}

fn check_health_check(hc: &HealthCheckConfig, errors: &mut Vec<ValidationError>) {
    if hc.interval_ms == 0 {
        errors.push(ValidationError::new(
            "health_check.interval_ms",
            "must be greater than 0",
        ));
    }
    if hc.timeout_ms == 0 {
        errors.push(ValidationError::new(
            "health_check.timeout_ms",
            "must be greater than 0",
        ));
    }
    if hc.healthy_threshold == 0 {
        errors.push(ValidationError::new(
            "health_check.healthy_threshold",
            "must be at least 1",
        ));
    }
    if hc.unhealthy_threshold == 0 {
        errors.push(ValidationError::new(
            "health_check.unhealthy_threshold",
            "must be at least 1",
        ));
    }
    for addr in &hc.addresses {
        if addr.rsplit_once(':').map_or(true, |(host, port)| {
            host.is_empty() || port.parse::<u16>().is_err()
        }) {
            errors.push(ValidationError::new(
                "health_check.addresses",
                format!("'{}' is not a host:port pair", addr),
            ));
        }
    }
    if hc.protocol == HealthCheckProtocol::Http && !hc.path.starts_with('/') {
        errors.push(ValidationError::new("health_check.path", "must start with '/'"));
    }
}
