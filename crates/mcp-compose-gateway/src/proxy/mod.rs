//! MCP reverse proxy
//!
//! Routes `POST /{server}` JSON-RPC payloads to the named upstream (HTTP or
//! a stdio bridge over `exec`), and serves discovery, lifecycle, log, audit
//! and OAuth mediation endpoints. Everything except `/health`, `/oauth/*`
//! and `/.well-known/*` requires the bearer token.

mod connections;
mod handlers;
pub mod oauth;
pub mod stdio_bridge;
pub mod upstream;

pub use connections::{ConnectionTracker, ConnectionsSnapshot, ServerConnections};
pub use stdio_bridge::StdioBridgePool;
pub use upstream::{DiscoveredServer, Upstream};

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    body::Body,
    http::header,
    middleware,
    response::Response,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use mcp_compose_core::{manifest::ProxySection, ActivityPublisher, ActivityStore, ComposeControl};
use mcp_compose_mcp::UpstreamError;
use mcp_compose_runtime::ContainerRuntime;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::auth::{require_bearer, BearerPolicy};
use crate::error::ApiError;
use crate::server::{self, logging_middleware, rate_limit, HttpServerConfig};

/// Default deadline for an upstream to answer with headers
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Proxy settings resolved from `[proxy]` and the environment
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub http: HttpServerConfig,
    pub api_key: Option<String>,
    /// Host for HTTP upstreams when running outside the overlay network
    pub upstream_host: Option<String>,
    /// Authorization server fronted by `/oauth/*`
    pub oauth_upstream: Option<String>,
    pub rate_limit_per_minute: u32,
    pub upstream_timeout: Duration,
}

impl ProxyConfig {
    pub fn from_section(section: &ProxySection) -> Self {
        let http = HttpServerConfig::new(section.host.clone(), section.port)
            .with_request_timeout(Duration::from_secs(section.read_timeout_secs.max(1)));
        let oauth_upstream = if section.oauth.enabled {
            section.oauth.authorization_server.clone()
        } else {
            None
        };
        Self {
            http,
            api_key: section.api_key.clone().filter(|k| !k.is_empty()),
            upstream_host: section.upstream_host.clone(),
            oauth_upstream,
            rate_limit_per_minute: section.oauth.rate_limit_per_minute,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::from_section(&ProxySection::default())
    }
}

/// Shared state behind every proxy handler
#[derive(Clone)]
pub struct ProxyState {
    pub runtime: Arc<dyn ContainerRuntime>,
    pub control: Arc<dyn ComposeControl>,
    pub publisher: ActivityPublisher,
    pub store: Option<Arc<dyn ActivityStore>>,
    pub connections: Arc<ConnectionTracker>,
    pub stdio: Arc<StdioBridgePool>,
    /// Client for MCP upstreams and OAuth passthrough
    pub http: reqwest::Client,
    /// Non-following client for `/oauth/authorize`
    pub oauth_http: reqwest::Client,
    pub config: Arc<ProxyConfig>,
    pub auth: Arc<BearerPolicy>,
    pub started_at: DateTime<Utc>,
}

impl ProxyState {
    pub fn new(
        config: ProxyConfig,
        runtime: Arc<dyn ContainerRuntime>,
        control: Arc<dyn ComposeControl>,
        publisher: ActivityPublisher,
        store: Option<Arc<dyn ActivityStore>>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build upstream HTTP client")?;
        let oauth_http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.upstream_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build OAuth HTTP client")?;

        Ok(Self {
            stdio: Arc::new(StdioBridgePool::new(runtime.clone())),
            runtime,
            control,
            publisher,
            store,
            connections: Arc::new(ConnectionTracker::new()),
            http,
            oauth_http,
            auth: Arc::new(BearerPolicy::new(config.api_key.as_deref())),
            config: Arc::new(config),
            started_at: Utc::now(),
        })
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

/// Stream an upstream response back with its status and headers, minus
/// hop-by-hop headers.
pub(crate) fn passthrough(response: reqwest::Response) -> Response {
    let status = response.status();
    let mut headers = response.headers().clone();
    for name in [
        header::CONNECTION,
        header::TRANSFER_ENCODING,
        header::CONTENT_LENGTH,
    ] {
        headers.remove(name);
    }
    let mut out = Response::new(Body::from_stream(response.bytes_stream()));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}

pub(crate) fn upstream_failure(err: reqwest::Error, timeout: Duration) -> ApiError {
    if err.is_timeout() {
        ApiError::Upstream(UpstreamError::Timeout(timeout))
    } else {
        ApiError::Upstream(UpstreamError::Unreachable(err.to_string()))
    }
}

/// The proxy HTTP server
pub struct ProxyServer {
    state: ProxyState,
}

impl ProxyServer {
    pub fn new(state: ProxyState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &ProxyState {
        &self.state
    }

    /// Build the router with auth, logging, rate limiting and timeouts.
    pub fn build_router(&self) -> Router {
        let state = self.state.clone();
        let config = state.config.clone();

        let router = Router::new()
            .route("/health", get(handlers::health))
            // OAuth mediation (public)
            .route(
                "/oauth/authorize",
                get(oauth::authorize).post(oauth::authorize),
            )
            .route("/oauth/callback", get(oauth::callback))
            .route("/oauth/token", post(oauth::token))
            .route("/oauth/register", post(oauth::register))
            .route(
                "/.well-known/oauth-authorization-server",
                get(oauth::metadata),
            )
            // First-party API
            .route("/api/servers", get(handlers::list_servers))
            .route("/api/servers/{action}", post(handlers::server_action))
            .route("/api/status", get(handlers::status))
            .route("/api/connections", get(handlers::connections))
            .route("/api/containers/{name}/logs", get(handlers::container_logs))
            .route("/api/containers/{name}/stats", get(handlers::container_stats))
            .route("/api/reload", post(handlers::reload))
            .route("/api/proxy/reload", post(handlers::reload))
            .route("/api/audit/activity", get(handlers::audit_activity))
            .route("/api/audit/stats", get(handlers::audit_stats))
            // Per-server routes
            .route("/{server}/docs", get(handlers::server_docs))
            .route("/{server}/openapi.json", get(handlers::server_openapi))
            .route("/{server}", post(handlers::forward_mcp))
            .with_state(state.clone());

        let mut router = router
            .layer(TimeoutLayer::new(config.http.request_timeout))
            .layer(middleware::from_fn_with_state(
                state.auth.clone(),
                require_bearer,
            ))
            .layer(middleware::from_fn_with_state(
                rate_limit::RateLimiter::oauth(config.rate_limit_per_minute),
                rate_limit::rate_limit_middleware,
            ))
            .layer(middleware::from_fn(
                logging_middleware::http_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http());

        if config.http.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        router
    }

    /// Serve until `cancel` fires, then close stdio bridges.
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        info!(
            "[Proxy] Auth: {}",
            if self.state.auth.is_enabled() {
                "bearer token required"
            } else {
                "disabled (no API key configured)"
            }
        );
        match &self.state.config.oauth_upstream {
            Some(upstream) => info!("[Proxy] OAuth mediation via {}", upstream),
            None => debug!("[Proxy] OAuth mediation disabled"),
        }
        if self.state.runtime.engine() == "none" {
            warn!("[Proxy] No container engine; only remote servers are routable");
        }

        let router = self.build_router();
        let result = server::serve("Proxy", router, &self.state.config.http, cancel).await;
        self.state.stdio.shutdown().await;
        result
    }
}
