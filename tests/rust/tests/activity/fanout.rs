//! Live delivery, replay and subscriber removal

use std::time::Duration;

use mcp_compose_core::{kinds, ActivityBus, ActivityBusConfig, ActivityEvent, ActivityStore};
use pretty_assertions::assert_eq;
use tests::db::TestStore;
use tests::events::{collect_events, wait_for_event, BrokenSink, RecordingSink};

use super::wait_for_subscribers;

const QUIET: Duration = Duration::from_millis(200);

#[tokio::test]
async fn test_every_subscriber_receives_events() {
    let bus = ActivityBus::start(ActivityBusConfig::default(), None);
    let (first, mut first_rx) = RecordingSink::new();
    let (second, mut second_rx) = RecordingSink::new();
    let _a = bus.subscribe(Box::new(first));
    let _b = bus.subscribe(Box::new(second));
    assert!(wait_for_subscribers(&bus, 2).await);

    bus.publish(ActivityEvent::info(kinds::TOOL, "search called").with_server("github"));

    for rx in [&mut first_rx, &mut second_rx] {
        let event = wait_for_event(rx, Duration::from_secs(2), |e| e.kind == kinds::TOOL)
            .await
            .expect("tool event");
        assert_eq!(event.message, "search called");
        assert_eq!(event.server.as_deref(), Some("github"));
    }
    bus.shutdown().await;
}

#[tokio::test]
async fn test_new_subscriber_gets_welcome() {
    let bus = ActivityBus::start(ActivityBusConfig::default(), None);
    let (sink, mut rx) = RecordingSink::new();
    let handle = bus.subscribe(Box::new(sink));

    let events = collect_events(&mut rx, QUIET).await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, kinds::CONNECTION);
    assert_eq!(
        events[0].details.as_ref().unwrap()["subscriberIndex"],
        handle.id()
    );
    bus.shutdown().await;
}

#[tokio::test]
async fn test_replay_is_oldest_first_and_limited() {
    let store = TestStore::in_memory();
    for message in ["one", "two", "three"] {
        store
            .store
            .insert(&ActivityEvent::info(kinds::REQUEST, message))
            .await
            .unwrap();
    }
    let config = ActivityBusConfig {
        replay_limit: 2,
        ..Default::default()
    };
    let bus = ActivityBus::start(config, Some(store.dyn_store()));
    let (sink, mut rx) = RecordingSink::new();
    let _subscription = bus.subscribe(Box::new(sink));

    let events = collect_events(&mut rx, QUIET).await;
    let messages: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();

    assert_eq!(messages, vec!["two", "three", "Connected to activity stream"]);
    bus.shutdown().await;
}

#[tokio::test]
async fn test_failing_subscriber_is_removed() {
    let bus = ActivityBus::start(ActivityBusConfig::default(), None);
    let (healthy, mut rx) = RecordingSink::new();
    let _healthy = bus.subscribe(Box::new(healthy));
    let _broken = bus.subscribe(Box::new(BrokenSink));

    bus.publish(ActivityEvent::warn(kinds::ERROR, "still flowing"));
    let event = wait_for_event(&mut rx, Duration::from_secs(2), |e| e.kind == kinds::ERROR).await;
    assert!(event.is_some());

    assert!(wait_for_subscribers(&bus, 1).await, "broken sink was not removed");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(bus.counters().subscribers, 1);
    bus.shutdown().await;
}

#[tokio::test]
async fn test_dropping_handle_unsubscribes() {
    let bus = ActivityBus::start(ActivityBusConfig::default(), None);
    let (sink, mut rx) = RecordingSink::new();
    let handle = bus.subscribe(Box::new(sink));
    assert!(wait_for_subscribers(&bus, 1).await);

    drop(handle);
    assert!(wait_for_subscribers(&bus, 0).await);

    bus.publish(ActivityEvent::info(kinds::SYSTEM, "nobody listens"));
    let events = collect_events(&mut rx, QUIET).await;
    assert!(events.iter().all(|e| e.kind != kinds::SYSTEM));
    bus.shutdown().await;
}

#[tokio::test]
async fn test_full_mailbox_drops_and_counts() {
    let config = ActivityBusConfig {
        mailbox_capacity: 2,
        ..Default::default()
    };
    let bus = ActivityBus::start(config, None);

    // the owner task cannot run until this test yields
    for i in 0..5 {
        bus.publish(ActivityEvent::info(kinds::REQUEST, format!("event {}", i)));
    }

    let counters = bus.counters();
    assert_eq!(counters.published, 2);
    assert_eq!(counters.dropped, 3);
    bus.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_drains_queued_events_into_store() {
    let store = TestStore::in_memory();
    let bus = ActivityBus::start(ActivityBusConfig::default(), Some(store.dyn_store()));

    for i in 0..3 {
        bus.publish(ActivityEvent::info(kinds::REQUEST, format!("queued {}", i)));
    }
    bus.shutdown().await;

    assert_eq!(store.store.stats().await.unwrap().total, 3);
}

#[tokio::test]
async fn test_publish_after_shutdown_is_ignored() {
    let bus = ActivityBus::start(ActivityBusConfig::default(), None);
    bus.shutdown().await;

    bus.publish(ActivityEvent::info(kinds::SYSTEM, "late"));

    assert_eq!(bus.counters().published, 0);
    assert_eq!(bus.counters().dropped, 0);
}
