//! Streaming integration tests
//!
//! Log tails served by the proxy as SSE and consumed back into feeds, and
//! the WebSocket pumps writing into an in-memory socket.

mod logs;

use axum::extract::ws::Message;
use futures::channel::mpsc;
use futures::SinkExt;
use mcp_compose_gateway::streaming::WsWriter;
use serde_json::Value;

/// Writer whose frames land in a channel.
pub fn channel_writer() -> (WsWriter, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded();
    (WsWriter::new(tx.sink_map_err(axum::Error::new)), rx)
}

/// JSON payload of every text frame received so far.
pub fn drain_json(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(Some(message)) = rx.try_next() {
        if let Message::Text(text) = message {
            frames.push(serde_json::from_str(text.as_str()).expect("frame is not JSON"));
        }
    }
    frames
}
