//! Connection pool manager.
//!
//! # Responsibilities
//! - Lazily open connections up to the configured pool size
//! - Hand out connections (acquire) and take them back (release)
//! - Repair failing connections on checkout
//! - Own the heartbeat task and the health checker
//! - Drain and close everything on shutdown

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::Request;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

use super::connection::PooledConnection;
use super::heartbeat::{self, SweepReport};
use super::lease::Lease;
use crate::config::schema::DEFAULT_POOL_SIZE;
use crate::config::{DetectorConfig, HealthCheckConfig};
use crate::detection::{
    dial, socket_factory, DetectionContext, DetectionRequest, DetectionResult, ErrorHook,
    SocketFactory, Transport, TransportError,
};
use crate::error::PoolError;
use crate::health::{HealthCheckService, HealthCheckStats};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Runtime-replaceable capabilities, guarded by one read/write lock.
struct Capabilities<T> {
    socket_factory: SocketFactory<T>,
    error_hook: Option<ErrorHook>,
}

pub(crate) struct PoolInner<T: Transport> {
    capabilities: RwLock<Capabilities<T>>,
    /// Idle queue: free-list and admission gate in one.
    pub(super) idle_tx: flume::Sender<PooledConnection<T>>,
    pub(super) idle_rx: flume::Receiver<PooledConnection<T>>,
    target_size: usize,
    live_count: AtomicUsize,
    grow_lock: Mutex<()>,
    shutdown: Shutdown,
    health_check: HealthCheckService,
    heartbeat_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> PoolInner<T> {
    pub(super) fn live_count(&self) -> usize {
        self.live_count.load(Ordering::Acquire)
    }

    /// Push a connection back onto the idle queue. Never blocks.
    pub(super) fn release(&self, conn: PooledConnection<T>) {
        if let Err(err) = self.idle_tx.try_send(conn) {
            let conn = err.into_inner();
            tracing::error!(
                connection_id = %conn.id(),
                "Idle queue full on release (connection released twice?), dropping connection"
            );
        }
    }

    /// Run the socket factory under shared access to the capabilities.
    async fn call_socket_factory(&self) -> Result<T, TransportError> {
        let capabilities = self.capabilities.read().await;
        let result = (capabilities.socket_factory)().await;
        if let Err(e) = &result {
            metrics::record_connect_failure();
            if let Some(hook) = &capabilities.error_hook {
                hook(e);
            }
        }
        result
    }

    async fn grow(&self) -> Result<(), PoolError> {
        let _guard = self.grow_lock.lock().await;
        if self.shutdown.is_triggered() {
            return Err(PoolError::Closed);
        }

        while self.live_count() < self.target_size {
            let transport = match self.call_socket_factory().await {
                Ok(transport) => transport,
                Err(e) => {
                    tracing::warn!(
                        live = self.live_count(),
                        target = self.target_size,
                        error = %e,
                        "Failed to open pooled connection"
                    );
                    return Err(PoolError::Connect(e));
                }
            };

            let conn = PooledConnection::new(transport);
            let live = self.live_count.fetch_add(1, Ordering::AcqRel) + 1;
            tracing::debug!(
                connection_id = %conn.id(),
                live,
                target = self.target_size,
                "Opened pooled connection"
            );
            metrics::record_connection_created();
            self.release(conn);
        }

        metrics::record_pool_size(self.live_count(), self.idle_rx.len());
        Ok(())
    }

    async fn checkout(self: &Arc<Self>) -> Result<Lease<T>, PoolError> {
        let mut shutdown = self.shutdown.subscribe();
        if self.shutdown.is_triggered() {
            return Err(PoolError::Closed);
        }

        if self.live_count() < self.target_size {
            self.grow().await?;
        }

        let conn = tokio::select! {
            conn = self.idle_rx.recv_async() => conn.map_err(|_| PoolError::Closed)?,
            _ = shutdown.recv() => return Err(PoolError::Closed),
        };
        // From here on the lease hands the connection back if this future is dropped.
        let lease = Lease::new(conn, Arc::clone(self));
        if self.shutdown.is_triggered() {
            // close() is draining; the lease returns the connection to it
            return Err(PoolError::Closed);
        }

        if lease.is_failing() {
            self.repair(lease).await
        } else {
            Ok(lease)
        }
    }

    async fn repair(&self, mut lease: Lease<T>) -> Result<Lease<T>, PoolError> {
        match self.call_socket_factory().await {
            Ok(transport) => {
                lease.reconnect(transport).await;
                metrics::record_reconnect(true);
                tracing::info!(
                    connection_id = %lease.id(),
                    reconnects = lease.reconnects(),
                    "Reconnected failing connection"
                );
                Ok(lease)
            }
            Err(e) => {
                metrics::record_reconnect(false);
                tracing::warn!(
                    connection_id = %lease.id(),
                    error = %e,
                    "Reconnect failed, connection stays failing"
                );
                Err(PoolError::Reconnect(e))
            }
        }
    }
}

/// Point-in-time view of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub target_size: usize,
    pub live: usize,
    pub idle: usize,
    pub closed: bool,
}

/// Builder for [`Pool`].
pub struct PoolBuilder<T: Transport> {
    socket_factory: SocketFactory<T>,
    error_hook: Option<ErrorHook>,
    pool_size: usize,
    heartbeat_interval: Option<Duration>,
    health_check: HealthCheckConfig,
}

impl<T: Transport> PoolBuilder<T> {
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Overrides the environment and the 20 second default.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    pub fn health_check(mut self, config: HealthCheckConfig) -> Self {
        self.health_check = config;
        self
    }

    pub fn error_hook(mut self, hook: ErrorHook) -> Self {
        self.error_hook = Some(hook);
        self
    }

    /// Create the pool and start its background tasks.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Result<Pool<T>, PoolError> {
        if self.pool_size == 0 {
            return Err(PoolError::InvalidPoolSize);
        }
        let health_check = HealthCheckService::new(self.health_check)?;
        let (idle_tx, idle_rx) = flume::bounded(self.pool_size);

        let inner = Arc::new(PoolInner {
            capabilities: RwLock::new(Capabilities {
                socket_factory: self.socket_factory,
                error_hook: self.error_hook,
            }),
            idle_tx,
            idle_rx,
            target_size: self.pool_size,
            live_count: AtomicUsize::new(0),
            grow_lock: Mutex::new(()),
            shutdown: Shutdown::new(),
            health_check,
            heartbeat_task: std::sync::Mutex::new(None),
        });

        let interval = heartbeat::resolve_interval(self.heartbeat_interval);
        let task = heartbeat::spawn(Arc::downgrade(&inner), interval, inner.shutdown.subscribe());
        *inner
            .heartbeat_task
            .lock()
            .expect("heartbeat task mutex poisoned") = Some(task);
        inner.health_check.run();

        tracing::info!(
            pool_size = self.pool_size,
            heartbeat_interval_ms = interval.as_millis() as u64,
            "Detector pool created"
        );
        Ok(Pool { inner })
    }
}

/// Bounded pool of connections to one detection endpoint.
///
/// Cloning is cheap; all clones share the same connections.
pub struct Pool<T: Transport> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Transport> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> Pool<T> {
    pub fn builder(socket_factory: SocketFactory<T>) -> PoolBuilder<T> {
        PoolBuilder {
            socket_factory,
            error_hook: None,
            pool_size: DEFAULT_POOL_SIZE,
            heartbeat_interval: None,
            health_check: HealthCheckConfig::default(),
        }
    }

    /// Pool of `pool_size` connections with health checks disabled.
    pub fn new(socket_factory: SocketFactory<T>, pool_size: usize) -> Result<Self, PoolError> {
        Self::builder(socket_factory).pool_size(pool_size).build()
    }

    /// Pool that dials `config.pool.address` over TCP and wraps each stream with `wrap`.
    pub fn from_config<F>(config: &DetectorConfig, wrap: F) -> Result<Self, PoolError>
    where
        F: Fn(TcpStream) -> T + Send + Sync + 'static,
    {
        let address = config.pool.address.clone();
        let connect_timeout = config.pool.connect_timeout();
        let wrap = Arc::new(wrap);
        let factory = socket_factory(move || {
            let address = address.clone();
            let wrap = Arc::clone(&wrap);
            async move {
                let stream = dial(address.as_str(), connect_timeout).await?;
                Ok(wrap(stream))
            }
        });

        let mut builder = Self::builder(factory)
            .pool_size(config.pool.pool_size)
            .health_check(config.health_check.clone());
        if let Some(interval) = config.pool.heartbeat_interval() {
            builder = builder.heartbeat_interval(interval);
        }
        builder.build()
    }

    pub async fn update_socket_factory(&self, socket_factory: SocketFactory<T>) {
        self.inner.capabilities.write().await.socket_factory = socket_factory;
        tracing::info!("Socket factory replaced");
    }

    pub async fn update_error_hook(&self, error_hook: Option<ErrorHook>) {
        self.inner.capabilities.write().await.error_hook = error_hook;
    }

    /// Check out a connection, growing the pool first if it is below size.
    ///
    /// Waits while every connection is checked out. A failing connection is
    /// repaired before being handed out; if that fails it goes back to the
    /// queue and the error is returned.
    pub async fn acquire(&self) -> Result<Lease<T>, PoolError> {
        self.inner.checkout().await
    }

    /// Return a connection obtained through [`Lease::detach`].
    pub fn release(&self, conn: PooledConnection<T>) {
        self.inner.release(conn);
    }

    pub async fn detect_request_in_ctx(
        &self,
        ctx: &mut DetectionContext,
    ) -> Result<DetectionResult, PoolError> {
        let mut conn = self.acquire().await?;
        Ok(conn.detect_request_in_ctx(ctx).await?)
    }

    pub async fn detect_response_in_ctx(
        &self,
        ctx: &mut DetectionContext,
    ) -> Result<DetectionResult, PoolError> {
        let mut conn = self.acquire().await?;
        Ok(conn.detect_response_in_ctx(ctx).await?)
    }

    /// Request and response detection on one connection.
    ///
    /// On failure the connection is marked failing and still returned to the
    /// pool; its next checkout replaces the transport.
    pub async fn detect(
        &self,
        ctx: &mut DetectionContext,
    ) -> Result<(DetectionResult, DetectionResult), PoolError> {
        let mut conn = self.acquire().await?;
        Ok(conn.detect(ctx).await?)
    }

    pub async fn detect_http_request(
        &self,
        req: &Request<Bytes>,
    ) -> Result<DetectionResult, PoolError> {
        let mut conn = self.acquire().await?;
        Ok(conn.detect_http_request(req).await?)
    }

    pub async fn detect_request(
        &self,
        req: &dyn DetectionRequest,
    ) -> Result<DetectionResult, PoolError> {
        let mut conn = self.acquire().await?;
        Ok(conn.detect_request(req).await?)
    }

    /// Forward a new health check config, ordered with factory/hook updates.
    pub async fn update_health_check_config(
        &self,
        config: HealthCheckConfig,
    ) -> Result<(), PoolError> {
        let _capabilities = self.inner.capabilities.write().await;
        self.inner.health_check.update_config(config)?;
        Ok(())
    }

    pub fn is_healthy(&self) -> bool {
        self.inner.health_check.is_healthy()
    }

    pub fn health_check_stats(&self) -> HealthCheckStats {
        self.inner.health_check.stats()
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            target_size: self.inner.target_size,
            live: self.inner.live_count(),
            idle: self.inner.idle_rx.len(),
            closed: self.inner.shutdown.is_triggered(),
        }
    }

    /// Run one heartbeat sweep now, outside the periodic schedule.
    ///
    /// Cancelling the returned future never loses a connection.
    pub async fn sweep_idle_connections(&self) -> SweepReport {
        heartbeat::sweep(&self.inner).await
    }

    /// Apply the health check section of each reloaded config until the
    /// sender side (usually a `ConfigWatcher`) goes away or the pool closes.
    pub fn spawn_config_reload(
        &self,
        mut updates: mpsc::UnboundedReceiver<DetectorConfig>,
    ) -> JoinHandle<()> {
        let pool = self.clone();
        tokio::spawn(async move {
            while let Some(config) = updates.recv().await {
                if pool.inner.shutdown.is_triggered() {
                    break;
                }
                if config.pool.pool_size != pool.inner.target_size {
                    tracing::warn!(
                        current = pool.inner.target_size,
                        requested = config.pool.pool_size,
                        "Pool size cannot change at runtime, ignoring"
                    );
                }
                if let Err(e) = pool.update_health_check_config(config.health_check).await {
                    tracing::error!(error = %e, "Rejected reloaded health check config");
                }
            }
        })
    }

    /// Shut the pool down.
    ///
    /// Stops the heartbeat task, then takes back and closes every live
    /// connection, then stops the health checker. Waits for checked-out
    /// connections to be released, so never call this while holding a
    /// [`Lease`]. Calls after the first return immediately.
    pub async fn close(&self) {
        let inner = &self.inner;
        if !inner.shutdown.trigger() {
            return;
        }
        tracing::info!(live = inner.live_count(), "Closing detector pool");

        let heartbeat = inner
            .heartbeat_task
            .lock()
            .expect("heartbeat task mutex poisoned")
            .take();
        if let Some(task) = heartbeat {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Heartbeat task failed");
            }
        }

        let _guard = inner.grow_lock.lock().await;
        let live = inner.live_count();
        for _ in 0..live {
            let Ok(mut conn) = inner.idle_rx.recv_async().await else {
                break;
            };
            conn.close().await;
            inner.live_count.fetch_sub(1, Ordering::AcqRel);
        }

        inner.health_check.close().await;
        metrics::record_pool_size(inner.live_count(), inner.idle_rx.len());
        tracing::info!("Detector pool closed");
    }
}
