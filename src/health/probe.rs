//! Endpoint reachability probes.
//!
//! # Responsibilities
//! - Check one address with TCP connect or HTTP GET
//! - Enforce the configured per-probe timeout
//!
//! # Design Decisions
//! - Probes never go through pooled connections
//! - HTTP probes share one client per health checker
//! - Any 2xx passes an HTTP probe

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tokio::net::TcpStream;
use tokio::time;

use super::HealthError;
use crate::config::{HealthCheckConfig, HealthCheckProtocol};

pub type HttpClient = Client<HttpConnector, Body>;

pub fn http_client() -> HttpClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

/// A single reachability check.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Address being probed, for logs.
    fn target(&self) -> &str;

    async fn check(&self) -> Result<(), HealthError>;
}

/// Probe that only establishes a TCP connection.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    fn target(&self) -> &str {
        &self.address
    }

    async fn check(&self) -> Result<(), HealthError> {
        match time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(HealthError::Tcp(e)),
            Err(_) => Err(HealthError::Timeout(self.timeout)),
        }
    }
}

/// Probe that issues `GET http://{address}{path}`.
#[derive(Clone)]
pub struct HttpProbe {
    client: HttpClient,
    address: String,
    path: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(
        client: HttpClient,
        address: impl Into<String>,
        path: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            address: address.into(),
            path: path.into(),
            timeout,
        }
    }

    fn uri(&self) -> String {
        format!("http://{}{}", self.address, self.path)
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn target(&self) -> &str {
        &self.address
    }

    async fn check(&self) -> Result<(), HealthError> {
        let request = Request::builder()
            .method("GET")
            .uri(self.uri())
            .header("user-agent", "detector-pool-health-check")
            .body(Body::empty())
            .map_err(|e| HealthError::InvalidAddress(format!("{}: {}", self.address, e)))?;

        match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status().is_success() => Ok(()),
            Ok(Ok(response)) => Err(HealthError::Status(response.status().as_u16())),
            Ok(Err(e)) => Err(HealthError::Http(e.to_string())),
            Err(_) => Err(HealthError::Timeout(self.timeout)),
        }
    }
}

/// Build one probe per configured address.
pub fn probes_for(config: &HealthCheckConfig, client: &HttpClient) -> Vec<Box<dyn Probe>> {
    config
        .addresses
        .iter()
        .map(|addr| -> Box<dyn Probe> {
            match config.protocol {
                HealthCheckProtocol::Tcp => Box::new(TcpProbe::new(addr.clone(), config.timeout())),
                HealthCheckProtocol::Http => Box::new(HttpProbe::new(
                    client.clone(),
                    addr.clone(),
                    config.path.clone(),
                    config.timeout(),
                )),
            }
        })
        .collect()
}
