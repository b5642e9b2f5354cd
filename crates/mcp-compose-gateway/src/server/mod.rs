//! Shared HTTP server plumbing for the proxy and the dashboard.

pub mod logging_middleware;
pub mod rate_limit;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Listen address and timeouts
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    /// Deadline for a handler to produce response headers
    pub request_timeout: Duration,
    pub enable_cors: bool,
}

impl HttpServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            request_timeout: Duration::from_secs(15),
            enable_cors: true,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

/// Bind and serve until `cancel` fires. Remote addresses are exposed to
/// handlers through `ConnectInfo`.
pub async fn serve(
    name: &str,
    router: Router,
    config: &HttpServerConfig,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = config.addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("[{}] Listening on http://{}", name, addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await
    .with_context(|| format!("{} server failed", name))?;

    info!("[{}] Stopped", name);
    Ok(())
}
