//! Periodic proxy snapshots over WebSocket

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::WebSocket;
use chrono::Utc;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{spawn_pinger, watch_for_close, WsWriter, METRICS_INTERVAL, WRITE_DEADLINE};

/// Where metric snapshots come from (the proxy's status endpoints)
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn status(&self) -> Result<Value, String>;

    async fn connections(&self) -> Result<Value, String>;
}

/// `{timestamp, status, connections}`; a failed fetch becomes `{"error": ..}`
/// in its slot.
pub async fn snapshot(source: &dyn MetricsSource) -> Value {
    let (status, connections) = tokio::join!(source.status(), source.connections());
    json!({
        "timestamp": Utc::now(),
        "status": status.unwrap_or_else(|e| json!({ "error": e })),
        "connections": connections.unwrap_or_else(|e| json!({ "error": e })),
    })
}

/// Emit a snapshot immediately and then every `interval` until a write
/// fails or `cancel` fires.
pub async fn pump_metrics(
    source: Arc<dyn MetricsSource>,
    writer: &WsWriter,
    cancel: &CancellationToken,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        let frame = snapshot(source.as_ref()).await;
        if let Err(e) = writer.send_json(&frame, WRITE_DEADLINE).await {
            debug!("[Metrics] Write failed: {}", e);
            cancel.cancel();
            return;
        }
    }
}

pub async fn serve_metrics_socket(socket: WebSocket, source: Arc<dyn MetricsSource>) {
    let (sink, receiver) = socket.split();
    let writer = WsWriter::new(sink);
    let cancel = CancellationToken::new();
    let pinger = spawn_pinger(writer.clone(), cancel.clone());
    let watcher = watch_for_close(receiver, cancel.clone());

    pump_metrics(source, &writer, &cancel, METRICS_INTERVAL).await;

    cancel.cancel();
    let _ = pinger.await;
    let _ = watcher.await;
    writer.close().await;
}
