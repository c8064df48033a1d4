//! Shared utilities for pool integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use detector_pool::{
    socket_factory, DetectionContext, DetectionRequest, DetectionResult, Pool, SocketFactory,
    Transport, TransportError,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Knobs and counters shared by every transport a [`MockFactory`] creates.
#[derive(Debug, Default)]
pub struct MockState {
    pub fail_factory: AtomicBool,
    pub fail_heartbeat: AtomicBool,
    pub fail_exchange: AtomicBool,
    /// Added latency for every heartbeat, in milliseconds.
    pub heartbeat_delay_ms: AtomicU64,
    pub factory_calls: AtomicUsize,
    pub factory_failures: AtomicUsize,
    pub heartbeats: AtomicUsize,
    pub exchanges: AtomicUsize,
    pub closed: AtomicUsize,
}

impl MockState {
    pub fn set(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct MockTransport {
    /// Sequence number of the factory call that built this transport.
    pub serial: usize,
    state: Arc<MockState>,
}

impl MockTransport {
    fn exchange(&self) -> Result<(), TransportError> {
        self.state.exchanges.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_exchange.load(Ordering::SeqCst) {
            Err(TransportError::Protocol("injected exchange failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn detect_request_in_ctx(
        &mut self,
        _ctx: &mut DetectionContext,
    ) -> Result<DetectionResult, TransportError> {
        self.exchange().map(|_| DetectionResult::passed())
    }

    async fn detect_response_in_ctx(
        &mut self,
        _ctx: &mut DetectionContext,
    ) -> Result<DetectionResult, TransportError> {
        self.exchange().map(|_| DetectionResult::blocked(403, "evt-1"))
    }

    async fn detect_request(
        &mut self,
        req: &dyn DetectionRequest,
    ) -> Result<DetectionResult, TransportError> {
        self.exchange()?;
        if req.uri().path().starts_with("/admin") {
            Ok(DetectionResult::blocked(403, "evt-admin"))
        } else {
            Ok(DetectionResult::passed())
        }
    }

    async fn heartbeat(&mut self) -> Result<(), TransportError> {
        let delay = self.state.heartbeat_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.state.heartbeats.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_heartbeat.load(Ordering::SeqCst) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory producing [`MockTransport`]s, optionally slowed down.
pub fn mock_factory(state: Arc<MockState>, delay: Duration) -> SocketFactory<MockTransport> {
    socket_factory(move || {
        let state = Arc::clone(&state);
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let serial = state.factory_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if state.fail_factory.load(Ordering::SeqCst) {
                state.factory_failures.fetch_add(1, Ordering::SeqCst);
                return Err(TransportError::Protocol("injected dial failure".into()));
            }
            Ok(MockTransport { serial, state })
        }
    })
}

/// Pool with a long heartbeat interval so sweeps only run when a test asks.
pub fn mock_pool(size: usize) -> (Pool<MockTransport>, Arc<MockState>) {
    let state = Arc::new(MockState::default());
    let pool = Pool::builder(mock_factory(Arc::clone(&state), Duration::ZERO))
        .pool_size(size)
        .heartbeat_interval(Duration::from_secs(3600))
        .build()
        .unwrap();
    (pool, state)
}

/// Line-oriented transport over TCP used against [`start_line_backend`].
#[derive(Debug)]
pub struct LineTransport {
    stream: BufReader<TcpStream>,
}

impl LineTransport {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    async fn call(&mut self, line: &str) -> Result<String, TransportError> {
        self.stream.get_mut().write_all(line.as_bytes()).await?;
        self.stream.get_mut().write_all(b"\n").await?;
        let mut reply = String::new();
        if self.stream.read_line(&mut reply).await? == 0 {
            return Err(TransportError::Closed);
        }
        Ok(reply.trim_end().to_string())
    }

    fn verdict(reply: String) -> Result<DetectionResult, TransportError> {
        match reply.as_str() {
            "pass" => Ok(DetectionResult::passed()),
            "block" => Ok(DetectionResult::blocked(403, "evt-tcp")),
            other => Err(TransportError::Protocol(format!("unexpected reply {other:?}"))),
        }
    }
}

#[async_trait]
impl Transport for LineTransport {
    async fn detect_request_in_ctx(
        &mut self,
        _ctx: &mut DetectionContext,
    ) -> Result<DetectionResult, TransportError> {
        let reply = self.call("request").await?;
        Self::verdict(reply)
    }

    async fn detect_response_in_ctx(
        &mut self,
        _ctx: &mut DetectionContext,
    ) -> Result<DetectionResult, TransportError> {
        let reply = self.call("response").await?;
        Self::verdict(reply)
    }

    async fn detect_request(
        &mut self,
        req: &dyn DetectionRequest,
    ) -> Result<DetectionResult, TransportError> {
        let reply = self.call(&format!("request {}", req.uri().path())).await?;
        Self::verdict(reply)
    }

    async fn heartbeat(&mut self) -> Result<(), TransportError> {
        match self.call("ping").await?.as_str() {
            "pong" => Ok(()),
            other => Err(TransportError::Protocol(format!("unexpected reply {other:?}"))),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream.get_mut().shutdown().await?;
        Ok(())
    }
}

/// Start a line backend: `ping` → `pong`, `response` → `block`, anything else → `pass`.
/// Returns the bound address and a counter of accepted connections.
pub async fn start_line_backend() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                let mut lines = BufReader::new(read).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let reply = match line.as_str() {
                        "ping" => "pong",
                        "response" => "block",
                        _ => "pass",
                    };
                    if write.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    (addr, accepted)
}
