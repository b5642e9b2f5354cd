//! Durable activity log behind the bus

use std::time::Duration;

use mcp_compose_core::{kinds, ActivityBus, ActivityBusConfig, ActivityEvent, ActivityStore};
use pretty_assertions::assert_eq;
use tests::db::TestStore;

/// Poll until the store holds `expected` rows.
async fn wait_for_total(store: &TestStore, expected: u64) -> u64 {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        let total = store.store.stats().await.unwrap().total;
        if total == expected || tokio::time::Instant::now() >= deadline {
            return total;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_published_events_are_persisted() {
    let store = TestStore::new();
    let bus = ActivityBus::start(ActivityBusConfig::default(), Some(store.dyn_store()));

    let event = ActivityEvent::error(kinds::ERROR, "tools/call → github failed")
        .with_server("github")
        .with_client("claude-desktop")
        .with_detail("status", 502);
    let id = event.id.clone();
    bus.publish(event);

    assert_eq!(wait_for_total(&store, 1).await, 1);
    let stored = store.store.get(&id).await.unwrap().expect("stored event");
    assert_eq!(stored.server.as_deref(), Some("github"));
    assert_eq!(stored.client.as_deref(), Some("claude-desktop"));
    assert_eq!(stored.details.unwrap()["status"], 502);
    bus.shutdown().await;
}

#[tokio::test]
async fn test_events_survive_reopen() {
    let store = TestStore::new();
    let event = ActivityEvent::info(kinds::SERVICE, "Server 'github' started").with_server("github");
    store.store.insert(&event).await.unwrap();

    let reopened = mcp_compose_storage::open_activity_store(Some(store.db_path())).unwrap();
    let recent = reopened.recent(10, None).await.unwrap();

    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, event.id);
    assert_eq!(recent[0].message, "Server 'github' started");
}

#[tokio::test]
async fn test_retention_prunes_old_rows() {
    let store = TestStore::in_memory();
    for i in 0..3 {
        store
            .store
            .insert(&ActivityEvent::info(kinds::REQUEST, format!("old {}", i)))
            .await
            .unwrap();
    }

    let config = ActivityBusConfig {
        retention: Duration::ZERO,
        retention_interval: Duration::from_millis(20),
        ..Default::default()
    };
    let bus = ActivityBus::start(config, Some(store.dyn_store()));

    assert_eq!(wait_for_total(&store, 0).await, 0);
    bus.shutdown().await;
}

#[tokio::test]
async fn test_retention_keeps_recent_rows() {
    let store = TestStore::in_memory();
    store
        .store
        .insert(&ActivityEvent::info(kinds::REQUEST, "fresh"))
        .await
        .unwrap();

    let config = ActivityBusConfig {
        retention_interval: Duration::from_millis(20),
        ..ActivityBusConfig::default().with_retention_days(30)
    };
    let bus = ActivityBus::start(config, Some(store.dyn_store()));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(store.store.stats().await.unwrap().total, 1);
    bus.shutdown().await;
}

#[tokio::test]
async fn test_since_filter_on_recent() {
    let store = TestStore::in_memory();
    let mut old = ActivityEvent::info(kinds::REQUEST, "old");
    old.timestamp = chrono::Utc::now() - chrono::Duration::hours(2);
    store.store.insert(&old).await.unwrap();
    store
        .store
        .insert(&ActivityEvent::info(kinds::REQUEST, "new"))
        .await
        .unwrap();

    let since = chrono::Utc::now() - chrono::Duration::hours(1);
    let recent = store.store.recent(10, Some(since)).await.unwrap();

    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].message, "new");
}
