//! mcp-compose Gateway
//!
//! The two HTTP surfaces of the control plane:
//! - The MCP reverse proxy: routes JSON-RPC to upstream servers by name,
//!   enforces the bearer policy, mediates the OAuth authorization-code flow
//!   and serves discovery, lifecycle, log and audit endpoints
//! - The operator dashboard: index page, inspector sessions, the task
//!   scheduler shim, activity intake and the log/metric/activity WebSockets
//!
//! ```text
//!  agents ──POST /{server}──▶ ProxyServer ──HTTP──▶ upstream container
//!                                  │       └─exec─▶ stdio container
//!                                  │ /api/*
//!  operator ──▶ DashboardServer ───┘
//!                  │  ├─ SessionManager (inspector)
//!                  │  └─ ActivityBus ──▶ /ws/activity subscribers
//!                  └─ /ws/logs ◀── proxy SSE (or engine CLI fallback)
//! ```

pub mod auth;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod server;
pub mod streaming;
pub mod templates;

pub use auth::{AuthError, BearerPolicy};
pub use dashboard::{DashboardConfig, DashboardServer, DashboardState, ProxyClient};
pub use error::{ApiError, ApiResult};
pub use proxy::{ConnectionTracker, ProxyConfig, ProxyServer, ProxyState};
pub use server::HttpServerConfig;
