//! Live streams for the dashboard and the proxy
//!
//! - `logs` - per-server log tail over WebSocket
//! - `metrics` - periodic proxy status/connection snapshots over WebSocket
//! - `activity` - activity bus subscribers backed by WebSockets
//! - `sse` - container logs as server-sent events, and the client-side parser
//!
//! Every socket gets one [`WsWriter`]; all writes go through its mutex with
//! a deadline, and a failed write cancels the socket's scope.

pub mod activity;
pub mod logs;
pub mod metrics;
pub mod sse;
mod ws_writer;

use std::time::Duration;

pub use ws_writer::{spawn_pinger, watch_for_close, WsWriter};

/// Deadline for one data frame
pub const WRITE_DEADLINE: Duration = Duration::from_secs(5);

/// Ping cadence on long-lived sockets
pub const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Deadline for one ping frame
pub const PING_DEADLINE: Duration = Duration::from_secs(10);

/// Metric snapshot cadence
pub const METRICS_INTERVAL: Duration = Duration::from_secs(5);
