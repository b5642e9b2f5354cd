//! Activity bus integration tests
//!
//! Live fan-out, replay, durable storage, retention and the cross-process
//! webhook publisher.

mod fanout;
mod store;
mod webhook;

use std::time::Duration;

use mcp_compose_core::ActivityBus;

/// Wait until the bus reports `expected` subscribers.
pub async fn wait_for_subscribers(bus: &ActivityBus, expected: usize) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if bus.counters().subscribers == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
