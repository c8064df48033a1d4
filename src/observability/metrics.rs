//! Metrics collection.
//!
//! # Metrics
//! - `detector_pool_connections_created_total` (counter)
//! - `detector_pool_connect_failures_total` (counter)
//! - `detector_pool_reconnects_total` (counter, label `outcome`)
//! - `detector_pool_heartbeats_total` (counter, label `outcome`)
//! - `detector_pool_live_connections` (gauge)
//! - `detector_pool_idle_connections` (gauge)
//! - `detector_endpoint_health` (gauge): 1=healthy, 0=unhealthy

use metrics::{counter, gauge};

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

pub fn record_connection_created() {
    counter!("detector_pool_connections_created_total").increment(1);
}

pub fn record_connect_failure() {
    counter!("detector_pool_connect_failures_total").increment(1);
}

pub fn record_reconnect(success: bool) {
    counter!("detector_pool_reconnects_total", "outcome" => outcome(success)).increment(1);
}

pub fn record_heartbeat(success: bool) {
    counter!("detector_pool_heartbeats_total", "outcome" => outcome(success)).increment(1);
}

pub fn record_pool_size(live: usize, idle: usize) {
    gauge!("detector_pool_live_connections").set(live as f64);
    gauge!("detector_pool_idle_connections").set(idle as f64);
}

pub fn record_endpoint_health(healthy: bool) {
    gauge!("detector_endpoint_health").set(if healthy { 1.0 } else { 0.0 });
}
