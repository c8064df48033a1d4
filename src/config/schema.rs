//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a detector client.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of pooled connections per endpoint.
pub const DEFAULT_POOL_SIZE: usize = 8;

/// Default heartbeat sweep interval in seconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 20;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DetectorConfig {
    /// Connection pool settings.
    pub pool: PoolConfig,

    /// Endpoint health check settings.
    pub health_check: HealthCheckConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Detection service address (e.g., "127.0.0.1:8000").
    pub address: String,

    /// Number of connections kept open.
    pub pool_size: usize,

    /// Heartbeat interval in seconds. Falls back to the environment, then 20.
    pub heartbeat_interval_secs: Option<u64>,

    /// TCP connect timeout in milliseconds. No timeout when unset.
    pub connect_timeout_ms: Option<u64>,
}

impl PoolConfig {
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval_secs.map(Duration::from_secs)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8000".to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            heartbeat_interval_secs: None,
            connect_timeout_ms: None,
        }
    }
}

/// How the health checker probes an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthCheckProtocol {
    /// Plain TCP connect.
    #[default]
    Tcp,
    /// HTTP GET against `path`, any 2xx passes.
    Http,
}

/// Health check configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Probe protocol.
    pub protocol: HealthCheckProtocol,

    /// Addresses to probe ("host:port").
    pub addresses: Vec<String>,

    /// Path to probe for HTTP health checks.
    pub path: String,

    /// Health check interval in milliseconds.
    pub interval_ms: u64,

    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// True when there is something to probe.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.addresses.is_empty()
    }

    /// Whether `other` probes the same targets in the same way.
    pub fn same_targets(&self, other: &HealthCheckConfig) -> bool {
        self.protocol == other.protocol
            && self.addresses == other.addresses
            && self.path == other.path
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            protocol: HealthCheckProtocol::Tcp,
            addresses: Vec::new(),
            path: "/".to_string(),
            interval_ms: 10_000,
            timeout_ms: 5_000,
            healthy_threshold: 2,
            unhealthy_threshold: 3,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let config: DetectorConfig = toml::from_str("[pool]\naddress = \"10.0.0.5:8000\"\n").unwrap();
        assert_eq!(config.pool.address, "10.0.0.5:8000");
        assert_eq!(config.pool.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.pool.heartbeat_interval(), None);
        assert!(!config.health_check.is_active());
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn health_check_section_parses() {
        let raw = r#"
            [health_check]
            enabled = true
            protocol = "http"
            addresses = ["10.0.0.5:8001"]
            path = "/stat"
            interval_ms = 500
        "#;
        let config: DetectorConfig = toml::from_str(raw).unwrap();
        let hc = &config.health_check;
        assert!(hc.is_active());
        assert_eq!(hc.protocol, HealthCheckProtocol::Http);
        assert_eq!(hc.interval(), Duration::from_millis(500));
        assert_eq!(hc.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn same_targets_ignores_timing() {
        let a = HealthCheckConfig {
            addresses: vec!["a:1".into()],
            ..Default::default()
        };
        let b = HealthCheckConfig {
            interval_ms: 1,
            ..a.clone()
        };
        let c = HealthCheckConfig {
            addresses: vec!["b:1".into()],
            ..a.clone()
        };
        assert!(a.same_targets(&b));
        assert!(!a.same_targets(&c));
    }
}
