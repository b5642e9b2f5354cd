//! Activity Bus - fan-out of activity events to live subscribers
//!
//! A single owner task holds the subscriber set. Everything else talks to it
//! through mailboxes, so a slow subscriber socket never blocks a publisher.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  publish() ──try_send──▶ events (bounded, drop on full)          │
//! │  subscribe() ──────────▶ registrations ─┐                        │
//! │  unsubscribe() ────────▶ deregistrations├─▶ owner task           │
//! │  shutdown() ───────────▶ cancel token ──┘    │                   │
//! │                                              ├─▶ store.insert    │
//! │                                              └─▶ sink writes     │
//! │                                                  (per-sub mutex) │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each event is written to every subscriber with a raw write deadline
//! inside an overall fan-out timeout. A subscriber whose write fails or times
//! out is closed and removed before the next event is processed.

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::ActivityEvent;
use crate::repository::ActivityStore;

/// Error returned by a subscriber sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("subscriber closed")]
    Closed,
    #[error("write failed: {0}")]
    Io(String),
}

/// Write half of a subscriber connection (usually a WebSocket).
#[async_trait]
pub trait ActivitySink: Send + 'static {
    /// Write one serialized event
    async fn send_text(&mut self, text: String) -> Result<(), SinkError>;

    /// Close the connection after removal. Errors are ignored.
    async fn close(&mut self) {}
}

/// Bus tuning
#[derive(Debug, Clone)]
pub struct ActivityBusConfig {
    /// Inbound mailbox capacity; publishes beyond it are dropped
    pub mailbox_capacity: usize,
    /// Historical events replayed to a new subscriber (needs a store)
    pub replay_limit: usize,
    /// Raw write deadline per subscriber
    pub write_deadline: Duration,
    /// Overall fan-out timeout per subscriber per event
    pub fanout_timeout: Duration,
    /// Rows older than this are pruned
    pub retention: Duration,
    pub retention_interval: Duration,
    /// Pause before restarting the owner loop after a panic
    pub restart_backoff: Duration,
}

impl Default for ActivityBusConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
            replay_limit: 50,
            write_deadline: Duration::from_secs(5),
            fanout_timeout: Duration::from_secs(3),
            retention: Duration::from_secs(30 * 24 * 60 * 60),
            retention_interval: Duration::from_secs(24 * 60 * 60),
            restart_backoff: Duration::from_secs(1),
        }
    }
}

impl ActivityBusConfig {
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention = Duration::from_secs(u64::from(days) * 24 * 60 * 60);
        self
    }
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    subscribers: AtomicUsize,
    next_subscriber: AtomicU64,
}

/// Live bus counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BusCounters {
    pub published: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub failed: u64,
    pub subscribers: usize,
}

struct Registration {
    id: u64,
    sink: Box<dyn ActivitySink>,
}

/// Handle returned by [`ActivityBus::subscribe`]. Dropping it unsubscribes.
pub struct SubscriberHandle {
    id: u64,
    deregister: mpsc::UnboundedSender<u64>,
}

impl SubscriberHandle {
    /// Subscriber index, also sent in the welcome event
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the subscriber. Safe to call more than once.
    pub fn unsubscribe(&self) {
        let _ = self.deregister.send(self.id);
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Activity Bus - cloneable handle to the owner task
#[derive(Clone)]
pub struct ActivityBus {
    events: mpsc::Sender<ActivityEvent>,
    register: mpsc::UnboundedSender<Registration>,
    deregister: mpsc::UnboundedSender<u64>,
    store: Option<Arc<dyn ActivityStore>>,
    counters: Arc<Counters>,
    cancel: CancellationToken,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ActivityBus {
    /// Spawn the owner task (and the retention task when a store is given).
    pub fn start(config: ActivityBusConfig, store: Option<Arc<dyn ActivityStore>>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.mailbox_capacity.max(1));
        let (register_tx, register_rx) = mpsc::unbounded_channel();
        let (deregister_tx, deregister_rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        let cancel = CancellationToken::new();

        let mut owner = Owner {
            config: config.clone(),
            store: store.clone(),
            subscribers: BTreeMap::new(),
            counters: counters.clone(),
            deregister: deregister_tx.clone(),
        };
        let mut mailboxes = Mailboxes {
            events: events_rx,
            register: register_rx,
            deregister: deregister_rx,
            cancel: cancel.clone(),
        };

        let backoff = config.restart_backoff;
        let owner_task = tokio::spawn(async move {
            loop {
                let run = AssertUnwindSafe(owner.run(&mut mailboxes)).catch_unwind().await;
                match run {
                    Ok(()) => break,
                    Err(_) => {
                        error!("[ActivityBus] Owner loop panicked, restarting in {:?}", backoff);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
            owner.close_all().await;
            info!("[ActivityBus] Stopped");
        });

        let mut tasks = vec![owner_task];
        if let Some(store) = store.clone() {
            tasks.push(spawn_retention(store, &config, cancel.clone()));
        }

        info!(
            capacity = config.mailbox_capacity,
            durable = store.is_some(),
            "[ActivityBus] Started"
        );

        Self {
            events: events_tx,
            register: register_tx,
            deregister: deregister_tx,
            store,
            counters,
            cancel,
            tasks: Arc::new(Mutex::new(tasks)),
        }
    }

    /// Enqueue an event without waiting. A full mailbox drops the event.
    pub fn publish(&self, event: ActivityEvent) {
        match self.events.try_send(event) {
            Ok(()) => {
                self.counters.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    kind = %event.kind,
                    "[ActivityBus] Mailbox full, dropping event"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("[ActivityBus] Bus stopped, event discarded");
            }
        }
    }

    /// Register a sink. It receives replayed history (when a store is
    /// configured), every event published afterwards, and a welcome event.
    pub fn subscribe(&self, sink: Box<dyn ActivitySink>) -> SubscriberHandle {
        let id = self.counters.next_subscriber.fetch_add(1, Ordering::Relaxed) + 1;
        if self.register.send(Registration { id, sink }).is_err() {
            debug!("[ActivityBus] Bus stopped, subscription ignored");
        }
        SubscriberHandle {
            id,
            deregister: self.deregister.clone(),
        }
    }

    /// Remove a subscriber by index. Unknown indexes are ignored.
    pub fn unsubscribe(&self, id: u64) {
        let _ = self.deregister.send(id);
    }

    /// Durable store, if one is configured
    pub fn store(&self) -> Option<&Arc<dyn ActivityStore>> {
        self.store.as_ref()
    }

    pub fn counters(&self) -> BusCounters {
        BusCounters {
            published: self.counters.published.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            subscribers: self.counters.subscribers.load(Ordering::Relaxed),
        }
    }

    /// Drain queued events, close every subscriber and stop background tasks.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
    }
}

fn spawn_retention(
    store: Arc<dyn ActivityStore>,
    config: &ActivityBusConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let retention = config.retention;
    let period = config.retention_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let Ok(age) = chrono::Duration::from_std(retention) else {
                        continue;
                    };
                    let cutoff = chrono::Utc::now() - age;
                    match store.prune(cutoff).await {
                        Ok(0) => {}
                        Ok(removed) => info!(removed, "[ActivityBus] Pruned old activity"),
                        Err(e) => warn!("[ActivityBus] Retention prune failed: {}", e),
                    }
                }
            }
        }
    })
}

struct Mailboxes {
    events: mpsc::Receiver<ActivityEvent>,
    register: mpsc::UnboundedReceiver<Registration>,
    deregister: mpsc::UnboundedReceiver<u64>,
    cancel: CancellationToken,
}

type SharedSink = Arc<Mutex<Box<dyn ActivitySink>>>;

struct Owner {
    config: ActivityBusConfig,
    store: Option<Arc<dyn ActivityStore>>,
    subscribers: BTreeMap<u64, SharedSink>,
    counters: Arc<Counters>,
    deregister: mpsc::UnboundedSender<u64>,
}

impl Owner {
    async fn run(&mut self, mailboxes: &mut Mailboxes) {
        loop {
            tokio::select! {
                biased;
                _ = mailboxes.cancel.cancelled() => {
                    while let Ok(event) = mailboxes.events.try_recv() {
                        self.handle_event(event).await;
                    }
                    return;
                }
                Some(registration) = mailboxes.register.recv() => {
                    self.handle_register(registration).await;
                }
                Some(id) = mailboxes.deregister.recv() => {
                    self.remove(id).await;
                }
                event = mailboxes.events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => return,
                },
            }
        }
    }

    async fn handle_register(&mut self, registration: Registration) {
        let Registration { id, sink } = registration;
        let sink: SharedSink = Arc::new(Mutex::new(sink));

        if let (Some(store), true) = (&self.store, self.config.replay_limit > 0) {
            match store.recent(self.config.replay_limit, None).await {
                Ok(mut history) => {
                    history.reverse();
                    for event in history {
                        let Ok(text) = serde_json::to_string(&event) else {
                            continue;
                        };
                        if let Err(e) = write_with_deadline(&sink, text, &self.config).await {
                            debug!(subscriber = id, "[ActivityBus] Replay failed: {}", e);
                            sink.lock().await.close().await;
                            return;
                        }
                    }
                }
                Err(e) => warn!("[ActivityBus] Could not load replay history: {}", e),
            }
        }

        self.subscribers.insert(id, sink.clone());
        self.counters
            .subscribers
            .store(self.subscribers.len(), Ordering::Relaxed);
        debug!(subscriber = id, total = self.subscribers.len(), "[ActivityBus] Subscriber registered");

        let config = self.config.clone();
        let deregister = self.deregister.clone();
        tokio::spawn(async move {
            let Ok(text) = serde_json::to_string(&ActivityEvent::welcome(id)) else {
                return;
            };
            if write_with_deadline(&sink, text, &config).await.is_err() {
                let _ = deregister.send(id);
            }
        });
    }

    async fn handle_event(&mut self, event: ActivityEvent) {
        if let Some(store) = &self.store {
            match tokio::time::timeout(self.config.fanout_timeout, store.insert(&event)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("[ActivityBus] Failed to persist event: {}", e),
                Err(_) => warn!("[ActivityBus] Timed out persisting event"),
            }
        }

        if self.subscribers.is_empty() {
            return;
        }

        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                warn!("[ActivityBus] Failed to serialize event: {}", e);
                return;
            }
        };

        let config = &self.config;
        let writes = self.subscribers.iter().map(|(id, sink)| {
            let text = text.clone();
            async move { (*id, write_with_deadline(sink, text, config).await) }
        });
        let results = futures::future::join_all(writes).await;

        for (id, result) in results {
            match result {
                Ok(()) => {
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    debug!(subscriber = id, "[ActivityBus] Dropping subscriber: {}", e);
                    self.remove(id).await;
                }
            }
        }
    }

    async fn remove(&mut self, id: u64) {
        if let Some(sink) = self.subscribers.remove(&id) {
            self.counters
                .subscribers
                .store(self.subscribers.len(), Ordering::Relaxed);
            let _ = tokio::time::timeout(self.config.write_deadline, async {
                sink.lock().await.close().await;
            })
            .await;
            debug!(subscriber = id, "[ActivityBus] Subscriber removed");
        }
    }

    async fn close_all(&mut self) {
        let ids: Vec<u64> = self.subscribers.keys().copied().collect();
        for id in ids {
            self.remove(id).await;
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum WriteError {
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("write deadline exceeded")]
    Timeout,
}

/// One serialized write: the per-subscriber mutex is held for the duration,
/// the raw write gets `write_deadline`, the whole attempt `fanout_timeout`.
async fn write_with_deadline(
    sink: &SharedSink,
    text: String,
    config: &ActivityBusConfig,
) -> Result<(), WriteError> {
    let attempt = async {
        let mut guard = sink.lock().await;
        match tokio::time::timeout(config.write_deadline, guard.send_text(text)).await {
            Ok(result) => result.map_err(WriteError::from),
            Err(_) => Err(WriteError::Timeout),
        }
    };
    match tokio::time::timeout(config.fanout_timeout, attempt).await {
        Ok(result) => result,
        Err(_) => Err(WriteError::Timeout),
    }
}
