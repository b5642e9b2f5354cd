//! Serialized WebSocket writes with deadlines

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use mcp_compose_core::SinkError;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{PING_DEADLINE, PING_INTERVAL};

type BoxSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

/// Write half of a socket, shared by the data loop and the pinger.
#[derive(Clone)]
pub struct WsWriter {
    sink: Arc<Mutex<BoxSink>>,
}

impl WsWriter {
    pub fn new<S>(sink: S) -> Self
    where
        S: Sink<Message, Error = axum::Error> + Send + 'static,
    {
        Self {
            sink: Arc::new(Mutex::new(Box::pin(sink))),
        }
    }

    async fn send(&self, message: Message, deadline: Duration) -> Result<(), SinkError> {
        let mut sink = self.sink.lock().await;
        match tokio::time::timeout(deadline, sink.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SinkError::Io(e.to_string())),
            Err(_) => Err(SinkError::Io(format!("write timed out after {:?}", deadline))),
        }
    }

    pub async fn send_text(&self, text: String, deadline: Duration) -> Result<(), SinkError> {
        self.send(Message::Text(text.into()), deadline).await
    }

    pub async fn send_json<T: Serialize>(&self, value: &T, deadline: Duration) -> Result<(), SinkError> {
        let text = serde_json::to_string(value).map_err(|e| SinkError::Io(e.to_string()))?;
        self.send_text(text, deadline).await
    }

    pub async fn ping(&self, deadline: Duration) -> Result<(), SinkError> {
        self.send(Message::Ping(Default::default()), deadline).await
    }

    /// Send a close frame and close the sink. Errors are ignored.
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        let _ = tokio::time::timeout(PING_DEADLINE, async {
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        })
        .await;
    }
}

/// Ping every [`PING_INTERVAL`]; a failed ping cancels `cancel`.
pub fn spawn_pinger(writer: WsWriter, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PING_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = writer.ping(PING_DEADLINE).await {
                        debug!("[WebSocket] Ping failed: {}", e);
                        cancel.cancel();
                        break;
                    }
                }
            }
        }
    })
}

/// Drain the read half; cancel `cancel` once the client closes or errors.
pub fn watch_for_close<S>(mut receiver: S, cancel: CancellationToken) -> JoinHandle<()>
where
    S: Stream<Item = Result<Message, axum::Error>> + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                message = receiver.next() => match message {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!("[WebSocket] Read error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                },
            }
        }
        cancel.cancel();
    })
}
