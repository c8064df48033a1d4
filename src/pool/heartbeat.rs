//! Periodic heartbeat sweep over idle connections.
//!
//! # Responsibilities
//! - Wake every heartbeat interval until shutdown
//! - Ping each idle, non-failing connection
//! - Convert ping failures into the `Failing` state
//!
//! # Design Decisions
//! - Pings at most as many connections as were idle at the tick
//! - Takes one connection out of the queue at a time
//! - Never grows the pool, never waits for checked-out connections
//! - No final sweep on shutdown

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use super::lease::Lease;
use super::manager::PoolInner;
use crate::detection::Transport;
use crate::observability::metrics;

/// Environment variable overriding the heartbeat interval, in seconds.
pub const HEARTBEAT_INTERVAL_ENV: &str = "DETECTOR_HEARTBEAT_INTERVAL";

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Connections drained from the idle queue.
    pub drained: usize,
    /// Connections pinged successfully.
    pub alive: usize,
    /// Connections whose ping failed (now failing).
    pub failed: usize,
    /// Connections skipped because they were already failing.
    pub skipped: usize,
}

/// Pick the interval: explicit setting, then the environment, then the default.
pub fn resolve_interval(explicit: Option<Duration>) -> Duration {
    explicit
        .or_else(|| parse_interval(std::env::var(HEARTBEAT_INTERVAL_ENV).ok().as_deref()))
        .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL)
}

fn parse_interval(raw: Option<&str>) -> Option<Duration> {
    raw?.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

pub(crate) fn spawn<T: Transport>(
    pool: Weak<PoolInner<T>>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!(interval_ms = interval.as_millis() as u64, "Heartbeat task starting");
        loop {
            tokio::select! {
                _ = time::sleep(interval) => {}
                _ = shutdown.recv() => {
                    tracing::debug!("Heartbeat task received shutdown signal, exiting loop");
                    return;
                }
            }

            let Some(pool) = pool.upgrade() else {
                return;
            };
            sweep(&pool).await;
        }
    })
}

/// Ping the connections idle at the start of the sweep, one at a time.
///
/// Each connection is held in a [`Lease`] while its ping is awaited and goes
/// back to the queue as soon as it is done, so acquirers only ever wait on one
/// ping and a dropped sweep returns what it holds.
pub(crate) async fn sweep<T: Transport>(pool: &Arc<PoolInner<T>>) -> SweepReport {
    let idle_at_tick = pool.idle_rx.len();
    let mut report = SweepReport::default();

    for _ in 0..idle_at_tick {
        let Ok(conn) = pool.idle_rx.try_recv() else {
            break;
        };
        report.drained += 1;
        let mut lease = Lease::new(conn, Arc::clone(pool));

        if lease.is_failing() {
            report.skipped += 1;
            continue;
        }
        match lease.heartbeat().await {
            Ok(()) => {
                report.alive += 1;
                metrics::record_heartbeat(true);
            }
            Err(e) => {
                report.failed += 1;
                metrics::record_heartbeat(false);
                tracing::warn!(connection_id = %lease.id(), error = %e, "Heartbeat failed");
            }
        }
    }

    metrics::record_pool_size(pool.live_count(), pool.idle_rx.len());
    tracing::trace!(?report, "Heartbeat sweep finished");
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_interval_accepts_positive_seconds() {
        assert_eq!(parse_interval(Some("5")), Some(Duration::from_secs(5)));
        assert_eq!(parse_interval(Some(" 30 ")), Some(Duration::from_secs(30)));
    }

    #[test]
    fn parse_interval_rejects_garbage() {
        assert_eq!(parse_interval(None), None);
        assert_eq!(parse_interval(Some("")), None);
        assert_eq!(parse_interval(Some("0")), None);
        assert_eq!(parse_interval(Some("-3")), None);
        assert_eq!(parse_interval(Some("20s")), None);
    }

    #[test]
    fn explicit_interval_wins() {
        let explicit = Duration::from_millis(250);
        assert_eq!(resolve_interval(Some(explicit)), explicit);
    }
}
