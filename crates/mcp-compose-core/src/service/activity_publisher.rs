//! Activity publishing from any process
//!
//! The process that owns the [`ActivityBus`] publishes locally. Other
//! processes (a proxy running detached from the dashboard) post events to the
//! dashboard's `/api/activity` intake instead. Both paths return immediately.

use std::time::Duration;
use tracing::debug;

use crate::domain::ActivityEvent;
use crate::event_bus::ActivityBus;

/// Timeout for a single webhook post
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(2);

/// Where activity goes
#[derive(Clone)]
pub enum ActivityPublisher {
    /// Owner process: straight into the bus mailbox
    Local(ActivityBus),
    /// Detached process: fire-and-forget POST to the intake endpoint
    Remote(WebhookPublisher),
    /// Activity disabled
    Disabled,
}

impl ActivityPublisher {
    pub fn publish(&self, event: ActivityEvent) {
        match self {
            Self::Local(bus) => bus.publish(event),
            Self::Remote(webhook) => webhook.publish(event),
            Self::Disabled => {}
        }
    }

    /// The local bus, when this process owns one
    pub fn bus(&self) -> Option<&ActivityBus> {
        match self {
            Self::Local(bus) => Some(bus),
            _ => None,
        }
    }
}

/// Posts events to `<dashboard>/api/activity`.
#[derive(Clone)]
pub struct WebhookPublisher {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl WebhookPublisher {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Spawn the post and return. Failures are logged at debug and dropped.
    pub fn publish(&self, event: ActivityEvent) {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.post(&event).await {
                debug!(url = %this.url, "[ActivityWebhook] Post failed: {}", e);
            }
        });
    }

    /// Post one event and wait for the response.
    pub async fn post(&self, event: &ActivityEvent) -> Result<(), reqwest::Error> {
        let mut request = self.client.post(&self.url).json(event);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request.send().await?.error_for_status()?;
        Ok(())
    }
}
