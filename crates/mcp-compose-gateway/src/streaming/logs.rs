//! Per-server log tail over WebSocket
//!
//! Frames are [`LogLine`] JSON objects. When the source ends, one final
//! `{"error": "log stream ended: <reason>"}` frame is written and the socket
//! closes. A failed write or a client close cancels the scope, which drops
//! the feed and with it the engine child.

use axum::extract::ws::WebSocket;
use futures::stream::BoxStream;
use futures::StreamExt;
use mcp_compose_core::LogLine;
use mcp_compose_runtime::{LogEvent, LogStream};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{spawn_pinger, watch_for_close, WsWriter, WRITE_DEADLINE};

/// `/ws/logs` query
#[derive(Debug, Default, Deserialize)]
pub struct LogsSocketQuery {
    pub server: Option<String>,
    pub tail: Option<i64>,
}

/// Item of a unified log feed (engine or proxy SSE)
#[derive(Debug, Clone, PartialEq)]
pub enum LogFeedItem {
    Line(LogLine),
    Ended(String),
}

pub type LogFeed = BoxStream<'static, LogFeedItem>;

/// Feed backed directly by an engine log stream.
pub fn runtime_feed(stream: LogStream, server: String) -> LogFeed {
    stream
        .map(move |event| match event {
            LogEvent::Line { text, .. } => LogFeedItem::Line(LogLine::from_raw(&server, &text)),
            LogEvent::Ended { reason } => LogFeedItem::Ended(reason),
        })
        .boxed()
}

/// Why a log pump stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogStreamEnd {
    /// Source finished; the final error frame was written
    Ended(String),
    WriteFailed,
    Cancelled,
}

/// Write feed items to `writer` until the feed ends, a write fails or
/// `cancel` fires.
pub async fn pump_logs(
    mut feed: LogFeed,
    writer: &WsWriter,
    cancel: &CancellationToken,
) -> LogStreamEnd {
    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => return LogStreamEnd::Cancelled,
            item = feed.next() => item,
        };
        match item {
            Some(LogFeedItem::Line(line)) => {
                if let Err(e) = writer.send_json(&line, WRITE_DEADLINE).await {
                    debug!("[LogStream] Write failed: {}", e);
                    cancel.cancel();
                    return LogStreamEnd::WriteFailed;
                }
            }
            Some(LogFeedItem::Ended(reason)) => return finish(writer, reason).await,
            None => return finish(writer, "stream closed".to_string()).await,
        }
    }
}

async fn finish(writer: &WsWriter, reason: String) -> LogStreamEnd {
    let frame = json!({ "error": format!("log stream ended: {}", reason) });
    let _ = writer.send_json(&frame, WRITE_DEADLINE).await;
    LogStreamEnd::Ended(reason)
}

/// Drive one `/ws/logs` socket. `feed` is the opened source or the reason it
/// could not be opened.
pub async fn serve_log_socket(socket: WebSocket, server: String, feed: Result<LogFeed, String>) {
    let (sink, receiver) = socket.split();
    let writer = WsWriter::new(sink);
    let cancel = CancellationToken::new();
    let pinger = spawn_pinger(writer.clone(), cancel.clone());
    let watcher = watch_for_close(receiver, cancel.clone());

    let end = match feed {
        Ok(feed) => pump_logs(feed, &writer, &cancel).await,
        Err(e) => {
            let _ = writer
                .send_json(&json!({ "error": e }), WRITE_DEADLINE)
                .await;
            LogStreamEnd::Ended(e)
        }
    };
    info!(server = %server, "[LogStream] Closed: {:?}", end);

    cancel.cancel();
    let _ = pinger.await;
    let _ = watcher.await;
    writer.close().await;
}
