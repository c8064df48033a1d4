//! Active health checking of the detection endpoint.
//!
//! # Responsibilities
//! - Periodically probe the configured addresses
//! - Maintain the endpoint's health state and counters
//! - Accept configuration changes while running

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use futures_util::future::join_all;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time;

use super::probe::{self, HttpClient};
use super::state::{HealthCheckStats, HealthStatus};
use super::HealthError;
use crate::config::validation::validate_health_check;
use crate::config::HealthCheckConfig;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

struct Shared {
    config: ArcSwap<HealthCheckConfig>,
    status: Mutex<HealthStatus>,
    client: HttpClient,
    /// Cuts the current sleep short after a config swap.
    reconfigured: Notify,
}

impl Shared {
    fn status(&self) -> std::sync::MutexGuard<'_, HealthStatus> {
        self.status.lock().expect("health status mutex poisoned")
    }

    async fn check_once(&self, config: &HealthCheckConfig) -> bool {
        let probes = probe::probes_for(config, &self.client);
        let results = join_all(
            probes
                .iter()
                .map(|p| async move { (p.target(), p.check().await) }),
        )
        .await;

        let mut passed = true;
        for (target, result) in results {
            if let Err(e) = result {
                tracing::warn!(target = %target, error = %e, "Health probe failed");
                passed = false;
            }
        }

        let mut status = self.status();
        // Targets changed mid-probe; the result describes a stale endpoint.
        if !self.config.load().same_targets(config) {
            return passed;
        }

        let transition = if passed {
            status.record_success(config.healthy_threshold)
        } else {
            status.record_failure(config.unhealthy_threshold)
        };

        if let Some(state) = transition {
            if state.is_healthy() {
                tracing::info!(state = ?state, "Detection endpoint marked healthy");
            } else {
                tracing::warn!(state = ?state, "Detection endpoint marked unhealthy");
            }
            metrics::record_endpoint_health(state.is_healthy());
        }
        passed
    }
}

/// Periodic reachability checker for the detection endpoint.
pub struct HealthCheckService {
    shared: Arc<Shared>,
    shutdown: Shutdown,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthCheckService {
    /// Create a checker. Fails if the configuration is invalid.
    pub fn new(config: HealthCheckConfig) -> Result<Self, HealthError> {
        validate_config(&config)?;

        Ok(Self {
            shared: Arc::new(Shared {
                config: ArcSwap::from_pointee(config),
                status: Mutex::new(HealthStatus::new()),
                client: probe::http_client(),
                reconfigured: Notify::new(),
            }),
            shutdown: Shutdown::new(),
            task: Mutex::new(None),
        })
    }

    /// Start the probe loop on the current Tokio runtime. No-op if already
    /// running or closed.
    pub fn run(&self) {
        let mut task = self.task.lock().expect("health task mutex poisoned");
        if task.is_some() || self.shutdown.is_triggered() {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let shutdown = self.shutdown.subscribe();
        *task = Some(tokio::spawn(run_loop(shared, shutdown)));
    }

    /// Replace the configuration. A running loop picks it up immediately.
    pub fn update_config(&self, config: HealthCheckConfig) -> Result<(), HealthError> {
        validate_config(&config)?;

        let mut status = self.shared.status();
        let previous = self.shared.config.swap(Arc::new(config));
        let current = self.shared.config.load();
        if !previous.same_targets(&current) {
            status.reset();
        }
        drop(status);
        self.shared.reconfigured.notify_one();

        tracing::info!(
            enabled = current.enabled,
            addresses = ?current.addresses,
            interval_ms = current.interval_ms,
            "Health check config updated"
        );
        Ok(())
    }

    pub fn config(&self) -> Arc<HealthCheckConfig> {
        self.shared.config.load_full()
    }

    /// Current verdict. Always true while checks are disabled.
    pub fn is_healthy(&self) -> bool {
        let config = self.shared.config.load();
        if !config.is_active() {
            return true;
        }
        self.shared.status().state().is_healthy()
    }

    pub fn stats(&self) -> HealthCheckStats {
        let config = self.shared.config.load();
        let mut stats = self.shared.status().stats();
        if !config.is_active() {
            stats.healthy = true;
        }
        stats
    }

    /// Run one probe round immediately. Returns whether every probe passed.
    pub async fn check_now(&self) -> bool {
        let config = self.shared.config.load_full();
        if !config.is_active() {
            return true;
        }
        self.shared.check_once(&config).await
    }

    /// Stop the probe loop and wait for it to exit. Safe to call more than once.
    pub async fn close(&self) {
        self.shutdown.trigger();
        let handle = self.task.lock().expect("health task mutex poisoned").take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Health checker task failed");
            }
            tracing::debug!("Health checker stopped");
        }
    }
}

impl Drop for HealthCheckService {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

fn validate_config(config: &HealthCheckConfig) -> Result<(), HealthError> {
    validate_health_check(config).map_err(|errors| {
        HealthError::InvalidConfig(
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        )
    })
}

async fn run_loop(shared: Arc<Shared>, mut shutdown: broadcast::Receiver<()>) {
    tracing::info!("Health checker starting");

    loop {
        let config = shared.config.load_full();

        if config.is_active() {
            tokio::select! {
                _ = shared.check_once(&config) => {}
                _ = shutdown.recv() => break,
            }
        }

        tokio::select! {
            _ = time::sleep(config.interval()) => {}
            _ = shared.reconfigured.notified() => {}
            _ = shutdown.recv() => break,
        }
    }

    tracing::info!("Health checker received shutdown signal, exiting loop");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn tcp_config(addr: String) -> HealthCheckConfig {
        HealthCheckConfig {
            enabled: true,
            addresses: vec![addr],
            interval_ms: 20,
            timeout_ms: 500,
            healthy_threshold: 1,
            unhealthy_threshold: 2,
            ..Default::default()
        }
    }

    async fn closed_port() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr.to_string()
    }

    #[tokio::test]
    async fn rejects_invalid_config() {
        let config = HealthCheckConfig {
            interval_ms: 0,
            ..Default::default()
        };
        let err = HealthCheckService::new(config).err().unwrap();
        assert!(matches!(err, HealthError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn disabled_checker_reports_healthy() {
        let service = HealthCheckService::new(HealthCheckConfig::default()).unwrap();
        assert!(service.is_healthy());
        assert!(service.check_now().await);
        assert_eq!(service.stats().total_checks, 0);
        assert!(service.stats().healthy);
    }

    #[tokio::test]
    async fn unreachable_endpoint_turns_unhealthy() {
        let service = HealthCheckService::new(tcp_config(closed_port().await)).unwrap();

        assert!(!service.check_now().await);
        assert!(service.is_healthy(), "one failure is below the threshold");
        assert!(!service.check_now().await);
        assert!(!service.is_healthy());

        let stats = service.stats();
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.consecutive_failures, 2);
    }

    #[tokio::test]
    async fn target_change_resets_status() {
        let service = HealthCheckService::new(tcp_config(closed_port().await)).unwrap();
        service.check_now().await;
        service.check_now().await;
        assert!(!service.is_healthy());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        service.update_config(tcp_config(addr)).unwrap();
        assert!(service.is_healthy());
        assert_eq!(service.stats().total_checks, 0);

        // interval-only change keeps history
        service.check_now().await;
        let mut slower = (*service.config()).clone();
        slower.interval_ms = 1_000;
        service.update_config(slower).unwrap();
        assert_eq!(service.stats().total_checks, 1);
    }

    #[tokio::test]
    async fn loop_runs_until_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move { while listener.accept().await.is_ok() {} });

        let service = HealthCheckService::new(tcp_config(addr)).unwrap();
        service.run();
        service.run();

        tokio::time::sleep(Duration::from_millis(200)).await;
        service.close().await;
        service.close().await;

        let checks = service.stats().total_checks;
        assert!(checks >= 2, "expected several ticks, got {checks}");
        assert_eq!(service.stats().successes, checks);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(service.stats().total_checks, checks, "loop kept running after close");

        service.run();
        assert!(service.task.lock().unwrap().is_none(), "closed checker restarted");
    }
}
