//! Container logs as server-sent events
//!
//! The proxy serves `event: connected`, then one `event: log` per line, and
//! `event: completed` when the engine stream ends (`event: error` when it
//! cannot be opened). The dashboard consumes the same frames with
//! [`SseParser`] and turns them back into a [`LogFeed`].

use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;

use axum::response::sse::Event;
use futures::{Stream, StreamExt};
use mcp_compose_core::{split_timestamp, LogLine};
use mcp_compose_runtime::{ContainerRuntime, LogEvent, LogOptions};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::logs::{LogFeed, LogFeedItem};

fn named_event<T: Serialize>(name: &str, value: &T) -> Event {
    let data = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(name).data(data)
}

/// Server side: follow `container` and frame each line as an SSE event.
pub fn log_event_stream(
    runtime: Arc<dyn ContainerRuntime>,
    container: String,
    server: String,
    options: LogOptions,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    async_stream::stream! {
        let mut logs = match runtime.logs(&container, &options).await {
            Ok(logs) => logs,
            Err(e) => {
                debug!(container = %container, "[LogStream] Failed to open: {}", e);
                yield Ok(named_event("error", &json!({ "error": e.to_string() })));
                return;
            }
        };
        yield Ok(named_event("connected", &json!({ "container": container, "server": server })));

        while let Some(event) = logs.next().await {
            match event {
                LogEvent::Line { text, .. } => {
                    yield Ok(named_event("log", &LogLine::from_raw(&server, &text)));
                }
                LogEvent::Ended { reason } => {
                    yield Ok(named_event("completed", &json!({ "reason": reason })));
                    return;
                }
            }
        }
        yield Ok(named_event("completed", &json!({ "reason": "stream closed" })));
    }
}

/// One dispatched SSE frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental `text/event-stream` parser.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    /// Feed a chunk; returns every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() || self.event.is_some() {
                    frames.push(SseFrame {
                        event: self.event.take(),
                        data: std::mem::take(&mut self.data).join("\n"),
                    });
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }
        frames
    }
}

fn reason_from(data: &str, key: &str, fallback: &str) -> String {
    serde_json::from_str::<Value>(data)
        .ok()
        .and_then(|v| v.get(key).and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| fallback.to_string())
}

/// Map one frame from the proxy to a feed item; `None` for control frames.
pub fn frame_to_item(frame: &SseFrame, server: &str) -> Option<LogFeedItem> {
    match frame.event.as_deref().unwrap_or("message") {
        "log" | "message" => {
            let line = match serde_json::from_str::<LogLine>(&frame.data) {
                Ok(line) if split_timestamp(&line.message).0.is_some() => {
                    LogLine::parse_timestamped(line.server, &line.message)
                }
                Ok(line) => line,
                Err(_) => LogLine::parse_timestamped(server, &frame.data),
            };
            Some(LogFeedItem::Line(line))
        }
        "completed" => Some(LogFeedItem::Ended(reason_from(&frame.data, "reason", "completed"))),
        "error" => Some(LogFeedItem::Ended(reason_from(&frame.data, "error", &frame.data))),
        _ => None,
    }
}

/// Client side: turn a proxy SSE body into a log feed.
pub fn sse_log_feed<S, B, E>(body: S, server: String) -> LogFeed
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    Box::pin(async_stream::stream! {
        let mut body = Box::pin(body);
        let mut parser = SseParser::default();
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for frame in parser.push(bytes.as_ref()) {
                        if let Some(item) = frame_to_item(&frame, &server) {
                            let ended = matches!(item, LogFeedItem::Ended(_));
                            yield item;
                            if ended {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    yield LogFeedItem::Ended(format!("proxy stream failed: {}", e));
                    return;
                }
            }
        }
        yield LogFeedItem::Ended("proxy stream closed".to_string());
    })
}
