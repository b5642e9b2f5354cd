//! Activity bus subscribers backed by WebSockets

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::WebSocket;
use futures::StreamExt;
use mcp_compose_core::{ActivityBus, ActivitySink, SinkError};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{watch_for_close, WsWriter, WRITE_DEADLINE};

/// Bus sink writing text frames to one socket
pub struct WsActivitySink {
    writer: WsWriter,
    deadline: Duration,
}

impl WsActivitySink {
    pub fn new(writer: WsWriter) -> Self {
        Self {
            writer,
            deadline: WRITE_DEADLINE,
        }
    }
}

#[async_trait]
impl ActivitySink for WsActivitySink {
    async fn send_text(&mut self, text: String) -> Result<(), SinkError> {
        self.writer.send_text(text, self.deadline).await
    }

    async fn close(&mut self) {
        self.writer.close().await;
    }
}

/// Drive one `/ws/activity` socket until the client goes away or the bus
/// drops the subscriber.
pub async fn serve_activity_socket(socket: WebSocket, bus: Option<ActivityBus>) {
    let (sink, receiver) = socket.split();
    let writer = WsWriter::new(sink);

    let Some(bus) = bus else {
        let frame = json!({ "error": "activity bus is not available in this process" });
        let _ = writer.send_json(&frame, WRITE_DEADLINE).await;
        writer.close().await;
        return;
    };

    let cancel = CancellationToken::new();
    let handle = bus.subscribe(Box::new(WsActivitySink::new(writer.clone())));
    info!(subscriber = handle.id(), "[ActivityStream] Subscriber connected");

    let _ = watch_for_close(receiver, cancel.clone()).await;

    debug!(subscriber = handle.id(), "[ActivityStream] Subscriber disconnected");
    drop(handle);
    writer.close().await;
}
