//! Operator dashboard
//!
//! Hosts the index page, owns the inspector session pool and its sweeper,
//! terminates the log/metric/activity WebSockets, runs the task scheduler
//! shim and forwards everything else under `/api/` to the proxy.

mod handlers;
mod proxy_client;

pub use proxy_client::ProxyClient;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{any, get, post, MethodRouter},
    Router,
};
use mcp_compose_core::{ActivityPublisher, ActivityStore, Manifest};
use mcp_compose_mcp::{McpHttpClient, SchedulerDispatcher, SessionConfig, SessionManager};
use mcp_compose_runtime::ContainerRuntime;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::auth::{require_bearer, BearerPolicy};
use crate::server::{self, logging_middleware, HttpServerConfig};

/// Dashboard settings resolved from the manifest and environment
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub http: HttpServerConfig,
    pub title: String,
    pub theme: String,
    /// Proxy base URL used for discovery, lifecycle and inspector calls
    pub proxy_url: String,
    pub api_key: Option<String>,
    /// Declared server names shown on the index page
    pub servers: Vec<String>,
    pub session: SessionConfig,
    /// Deadline for non-streaming proxy calls
    pub proxy_timeout: Duration,
}

impl DashboardConfig {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let section = &manifest.dashboard;
        Self {
            http: HttpServerConfig::new(section.host.clone(), section.port),
            title: mcp_compose_core::branding::DISPLAY_NAME.to_string(),
            theme: section.theme.clone(),
            proxy_url: manifest.proxy.base_url(),
            api_key: manifest.proxy.api_key.clone().filter(|k| !k.is_empty()),
            servers: manifest.servers.keys().cloned().collect(),
            session: SessionConfig::from(&manifest.inspector),
            proxy_timeout: Duration::from_secs(15),
        }
    }
}

/// Shared state behind every dashboard handler
#[derive(Clone)]
pub struct DashboardState {
    pub config: Arc<DashboardConfig>,
    pub proxy: ProxyClient,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub sessions: Arc<SessionManager>,
    pub scheduler: Arc<SchedulerDispatcher>,
    pub publisher: ActivityPublisher,
    pub store: Option<Arc<dyn ActivityStore>>,
    pub auth: Arc<BearerPolicy>,
}

impl DashboardState {
    pub fn new(
        config: DashboardConfig,
        runtime: Arc<dyn ContainerRuntime>,
        publisher: ActivityPublisher,
        store: Option<Arc<dyn ActivityStore>>,
    ) -> anyhow::Result<Self> {
        let proxy = ProxyClient::new(
            config.proxy_url.clone(),
            config.api_key.clone(),
            config.proxy_timeout,
        )?;
        let transport = Arc::new(McpHttpClient::new(
            config.proxy_url.clone(),
            config.api_key.clone(),
            config.session.request_timeout,
        ));
        let sessions = Arc::new(SessionManager::new(transport, config.session.clone()));
        let scheduler = Arc::new(SchedulerDispatcher::new(sessions.clone()));
        let store = store.or_else(|| publisher.bus().and_then(|bus| bus.store().cloned()));

        Ok(Self {
            auth: Arc::new(BearerPolicy::new(config.api_key.as_deref())),
            config: Arc::new(config),
            proxy,
            runtime,
            sessions,
            scheduler,
            publisher,
            store,
        })
    }

    /// Swap the session pool (and the scheduler built on it).
    pub fn with_sessions(mut self, sessions: Arc<SessionManager>) -> Self {
        self.scheduler = Arc::new(SchedulerDispatcher::new(sessions.clone()));
        self.sessions = sessions;
        self
    }
}

/// Routes in registration order: specific paths first, the `/api/`
/// passthrough last.
fn routes() -> Vec<(&'static str, MethodRouter<DashboardState>)> {
    vec![
        ("/", get(handlers::index)),
        ("/health", get(handlers::health)),
        ("/ws/logs", get(handlers::ws_logs)),
        ("/ws/metrics", get(handlers::ws_metrics)),
        ("/ws/activity", get(handlers::ws_activity)),
        ("/api/inspector/connect", post(handlers::inspector_connect)),
        ("/api/inspector/request", post(handlers::inspector_request)),
        ("/api/inspector/disconnect", post(handlers::inspector_disconnect)),
        ("/api/inspector/sessions", get(handlers::inspector_sessions)),
        ("/api/task-scheduler/{*path}", any(handlers::task_scheduler)),
        ("/api/server-docs/{server}", get(handlers::server_docs)),
        ("/api/server-docs/{server}/openapi.json", get(handlers::server_openapi)),
        ("/api/activity", post(handlers::activity_intake)),
        ("/api/activity/history", get(handlers::activity_history)),
        ("/api/activity/stats", get(handlers::activity_stats)),
        ("/api/{*rest}", any(handlers::api_passthrough)),
    ]
}

/// The dashboard HTTP server
pub struct DashboardServer {
    state: DashboardState,
}

impl DashboardServer {
    pub fn new(state: DashboardState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn build_router(&self) -> Router {
        let mut router = Router::new();
        for (path, handler) in routes() {
            debug!("[Dashboard] Registering route {}", path);
            router = router.route(path, handler);
        }

        let mut router = router
            .with_state(self.state.clone())
            .layer(middleware::from_fn_with_state(
                self.state.auth.clone(),
                require_bearer,
            ))
            .layer(middleware::from_fn(
                logging_middleware::http_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http());

        if self.state.config.http.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }
        router
    }

    /// Serve until `cancel` fires; the inspector sweeper runs alongside.
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        info!(
            "[Dashboard] Proxy at {} (theme: {})",
            self.state.config.proxy_url, self.state.config.theme
        );
        if self.state.publisher.bus().is_none() {
            info!("[Dashboard] No local activity bus; /ws/activity is unavailable");
        }

        let sweeper = self.state.sessions.spawn_sweeper(cancel.child_token());
        let router = self.build_router();
        let result = server::serve("Dashboard", router, &self.state.config.http, cancel.clone()).await;
        cancel.cancel();
        let _ = sweeper.await;
        result
    }
}
