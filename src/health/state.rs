//! Endpoint health state machine.
//!
//! # States
//! - Unknown: no verdict yet, treated as healthy
//! - Healthy: endpoint reachable
//! - Unhealthy: endpoint considered down
//!
//! # State Transitions
//! ```text
//! Healthy/Unknown → Unhealthy: consecutive failures >= unhealthy_threshold
//! Unhealthy/Unknown → Healthy: consecutive successes >= healthy_threshold
//! ```

use std::time::SystemTime;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn is_healthy(self) -> bool {
        self != HealthState::Unhealthy
    }
}

/// Snapshot of the health checker's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct HealthCheckStats {
    pub state: HealthState,
    pub healthy: bool,
    pub total_checks: u64,
    pub successes: u64,
    pub failures: u64,
    pub consecutive_successes: u64,
    pub consecutive_failures: u64,
    pub last_check: Option<SystemTime>,
}

/// Mutable health record, guarded by the service's mutex.
#[derive(Debug, Default)]
pub struct HealthStatus {
    state: HealthState,
    total_checks: u64,
    successes: u64,
    failures: u64,
    consecutive_successes: u64,
    consecutive_failures: u64,
    last_check: Option<SystemTime>,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    /// Record a passing check. Returns the new state if it changed.
    pub fn record_success(&mut self, healthy_threshold: u32) -> Option<HealthState> {
        self.touch();
        self.successes += 1;
        self.consecutive_failures = 0;
        self.consecutive_successes += 1;

        if self.state != HealthState::Healthy
            && self.consecutive_successes >= u64::from(healthy_threshold)
        {
            self.state = HealthState::Healthy;
            return Some(self.state);
        }
        None
    }

    /// Record a failing check. Returns the new state if it changed.
    pub fn record_failure(&mut self, unhealthy_threshold: u32) -> Option<HealthState> {
        self.touch();
        self.failures += 1;
        self.consecutive_successes = 0;
        self.consecutive_failures += 1;

        if self.state != HealthState::Unhealthy
            && self.consecutive_failures >= u64::from(unhealthy_threshold)
        {
            self.state = HealthState::Unhealthy;
            return Some(self.state);
        }
        None
    }

    /// Forget everything, e.g. after the probe targets changed.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn stats(&self) -> HealthCheckStats {
        HealthCheckStats {
            state: self.state,
            healthy: self.state.is_healthy(),
            total_checks: self.total_checks,
            successes: self.successes,
            failures: self.failures,
            consecutive_successes: self.consecutive_successes,
            consecutive_failures: self.consecutive_failures,
            last_check: self.last_check,
        }
    }

    fn touch(&mut self) {
        self.total_checks += 1;
        self.last_check = Some(SystemTime::now());
    }
}
