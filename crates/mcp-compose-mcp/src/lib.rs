//! # mcp-compose MCP client library
//!
//! JSON-RPC plumbing used by the dashboard to talk to MCP servers through
//! the proxy.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                    SchedulerDispatcher                    │
//! │   GET /tasks → tools/call list_tasks, POST /tasks → ...   │
//! └───────────────────────────────────────────────────────────┘
//!                              │ connect / execute / destroy
//!                              ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │                     SessionManager                        │
//! │  RwLock<HashMap<session_id, InspectorSession>>            │
//! │  (owner, server) → session_id     idle TTL + sweeper      │
//! └───────────────────────────────────────────────────────────┘
//!                              │ RpcTransport
//!                              ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │   McpHttpClient: POST <proxy>/<server>, Bearer, timeout   │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod error;
pub mod jsonrpc;
pub mod scheduler;
pub mod session;

pub use client::{McpHttpClient, RpcTransport};
pub use error::{InspectorError, UpstreamError};
pub use jsonrpc::{ensure_params, next_request_id, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use scheduler::{SchedulerDispatcher, SchedulerRoute, TASK_SCHEDULER_SERVER};
pub use session::{ConnectResult, SessionConfig, SessionInfo, SessionManager};
