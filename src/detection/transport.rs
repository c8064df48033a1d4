//! Transport capability and socket factories.
//!
//! # Responsibilities
//! - Define what a pooled connection must be able to do (`Transport`)
//! - Describe how the pool obtains new transports (`SocketFactory`)
//! - Provide a plain TCP dial helper for factories

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::Request;
use futures_util::future::BoxFuture;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time;

use super::{DetectionContext, DetectionRequest, DetectionResult};

/// Errors raised by a transport or by the factory that creates it.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("transport closed")]
    Closed,
}

/// One connection to the detection service.
///
/// Every method may leave the underlying stream in an unknown state when it
/// returns an error; the pool treats any error as "this connection is broken".
#[async_trait]
pub trait Transport: Send + 'static {
    async fn detect_request_in_ctx(
        &mut self,
        ctx: &mut DetectionContext,
    ) -> Result<DetectionResult, TransportError>;

    async fn detect_response_in_ctx(
        &mut self,
        ctx: &mut DetectionContext,
    ) -> Result<DetectionResult, TransportError>;

    /// Request and response detection in one go.
    async fn detect(
        &mut self,
        ctx: &mut DetectionContext,
    ) -> Result<(DetectionResult, DetectionResult), TransportError> {
        let request_result = self.detect_request_in_ctx(ctx).await?;
        let response_result = self.detect_response_in_ctx(ctx).await?;
        Ok((request_result, response_result))
    }

    async fn detect_http_request(
        &mut self,
        req: &Request<Bytes>,
    ) -> Result<DetectionResult, TransportError> {
        self.detect_request(req).await
    }

    async fn detect_request(
        &mut self,
        req: &dyn DetectionRequest,
    ) -> Result<DetectionResult, TransportError>;

    /// Liveness probe on an idle connection.
    async fn heartbeat(&mut self) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn detect_request_in_ctx(
        &mut self,
        ctx: &mut DetectionContext,
    ) -> Result<DetectionResult, TransportError> {
        (**self).detect_request_in_ctx(ctx).await
    }

    async fn detect_response_in_ctx(
        &mut self,
        ctx: &mut DetectionContext,
    ) -> Result<DetectionResult, TransportError> {
        (**self).detect_response_in_ctx(ctx).await
    }

    async fn detect(
        &mut self,
        ctx: &mut DetectionContext,
    ) -> Result<(DetectionResult, DetectionResult), TransportError> {
        (**self).detect(ctx).await
    }

    async fn detect_http_request(
        &mut self,
        req: &Request<Bytes>,
    ) -> Result<DetectionResult, TransportError> {
        (**self).detect_http_request(req).await
    }

    async fn detect_request(
        &mut self,
        req: &dyn DetectionRequest,
    ) -> Result<DetectionResult, TransportError> {
        (**self).detect_request(req).await
    }

    async fn heartbeat(&mut self) -> Result<(), TransportError> {
        (**self).heartbeat().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        (**self).close().await
    }
}

/// Creates a fresh transport. Called once per pooled connection and again on repair.
pub type SocketFactory<T> =
    Arc<dyn Fn() -> BoxFuture<'static, Result<T, TransportError>> + Send + Sync>;

/// Sink for connection creation failures.
pub type ErrorHook = Arc<dyn Fn(&TransportError) + Send + Sync>;

/// Wrap an async closure as a [`SocketFactory`].
pub fn socket_factory<T, F, Fut>(f: F) -> SocketFactory<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, TransportError>> + Send + 'static,
{
    Arc::new(move || -> BoxFuture<'static, Result<T, TransportError>> { Box::pin(f()) })
}

/// Open a TCP connection, optionally bounded by a connect timeout.
pub async fn dial<A: ToSocketAddrs>(
    addr: A,
    timeout: Option<Duration>,
) -> Result<TcpStream, TransportError> {
    let stream = match timeout {
        Some(limit) => time::timeout(limit, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::Timeout(limit))??,
        None => TcpStream::connect(addr).await?,
    };
    stream.set_nodelay(true)?;
    Ok(stream)
}
