//! Integration tests for presence tracking and publishing.

mod helpers;

use std::sync::Arc;

use proptest::prelude::*;

use herald_cache::memory::MemoryPresenceStore;
use herald_core::events::PresenceChangedEvent;
use herald_core::traits::MessageBus;
use herald_core::types::PresenceStatus;
use herald_realtime::presence::{PresencePublisher, PresenceTracker};

fn publisher() -> (PresencePublisher, Arc<helpers::RecordingSink>) {
    let sink = Arc::new(helpers::RecordingSink::default());
    let tracker = PresenceTracker::new(Arc::new(MemoryPresenceStore::new()));
    (PresencePublisher::new(tracker, sink.clone()), sink)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_connects_publish_one_online_event() {
    let (publisher, sink) = publisher();

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let publisher = publisher.clone();
            tokio::spawn(async move { publisher.connect("u1", &format!("conn-{i}")).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(sink.count_online(true), 1);
    assert_eq!(sink.count_online(false), 0);
    let record = publisher.tracker().get_presence("u1").await.unwrap();
    assert_eq!(record.connection_count(), 64);

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let publisher = publisher.clone();
            tokio::spawn(async move { publisher.disconnect("u1", &format!("conn-{i}")).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(sink.count_online(true), 1);
    assert_eq!(sink.count_online(false), 1);
    assert!(!publisher.tracker().is_online("u1").await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_interleaved_sessions_balance_edges() {
    let (publisher, sink) = publisher();

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let publisher = publisher.clone();
            tokio::spawn(async move {
                let conn = format!("conn-{i}");
                for _ in 0..10 {
                    publisher.connect("u1", &conn).await?;
                    tokio::task::yield_now().await;
                    publisher.disconnect("u1", &conn).await?;
                }
                Ok::<_, herald_core::error::AppError>(())
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Starts and ends offline, so every online edge has a matching offline edge.
    let online = sink.count_online(true);
    assert!(online >= 1);
    assert_eq!(online, sink.count_online(false));
    assert!(!publisher.tracker().is_online("u1").await.unwrap());

    let snap = publisher.metrics().snapshot();
    assert_eq!(snap.raised as usize, online * 2);
    assert_eq!(snap.failed, 0);
}

#[tokio::test]
async fn test_status_change_reaches_bus() {
    let app = helpers::TestHerald::new().await;
    app.bus
        .declare("presence.audit", &["presence.#".to_string()])
        .await
        .unwrap();

    app.engine.publisher.connect("u1", "c1").await.unwrap();
    app.engine
        .publisher
        .set_status("u1", PresenceStatus::DoNotDisturb)
        .await
        .unwrap();

    let batch = app.bus.fetch("presence.audit", "t", 10).await.unwrap();
    assert_eq!(batch.len(), 2);

    let events: Vec<PresenceChangedEvent> = batch
        .iter()
        .map(|d| serde_json::from_slice(&d.body).unwrap())
        .collect();
    assert_eq!(batch[0].routing_key, "presence.changed");
    assert!(events[0].is_online);
    assert_eq!(events[1].status, PresenceStatus::DoNotDisturb);
    assert_eq!(events[1].connection_count, 1);

    // Presence events are not domain events for the relay queue.
    assert!(app.drain().await.is_empty());
}

#[tokio::test]
async fn test_gateway_sink_targets_personal_channel() {
    let mut config = herald_core::config::AppConfig::default();
    config.presence.sink = "gateway".to_string();
    let app = helpers::TestHerald::with_config(config).await;

    app.engine.publisher.connect("u7", "c1").await.unwrap();
    app.engine.publisher.connect("u7", "c2").await.unwrap();

    let calls = app.transport.calls_to("user:u7");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].params["data"]["type"], "presence.changed");
    assert_eq!(calls[0].params["data"]["is_online"], true);
}

#[tokio::test]
async fn test_batch_lookup() {
    let app = helpers::TestHerald::new().await;
    app.engine.publisher.connect("u1", "c1").await.unwrap();
    app.engine
        .publisher
        .set_status("u2", PresenceStatus::Away)
        .await
        .unwrap();

    let ids = vec!["u1".to_string(), "u2".to_string(), "u3".to_string()];
    let records = app.engine.tracker.get_presence_batch(&ids).await.unwrap();
    assert_eq!(records.len(), 3);
    assert!(records[0].is_online());
    assert_eq!(records[1].status, PresenceStatus::Away);
    assert!(!records[1].is_online());
    assert!(!records[2].is_online());
    assert!(records[2].last_seen_at.is_none());
}

#[derive(Debug, Clone)]
enum Op {
    Connect(u8),
    Disconnect(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..4).prop_map(Op::Connect),
        (0u8..4).prop_map(Op::Disconnect),
    ]
}

proptest! {
    #[test]
    fn prop_events_match_edges(ops in proptest::collection::vec(op(), 0..60)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (publisher, sink) = publisher();

        let mut live = std::collections::BTreeSet::new();
        let mut edges = Vec::new();
        for op in &ops {
            let was_online = !live.is_empty();
            let record = match op {
                Op::Connect(c) => {
                    live.insert(*c);
                    rt.block_on(publisher.connect("u1", &format!("c{c}"))).unwrap().record
                }
                Op::Disconnect(c) => {
                    live.remove(c);
                    rt.block_on(publisher.disconnect("u1", &format!("c{c}"))).unwrap().record
                }
            };
            prop_assert_eq!(record.is_online(), record.connection_count() > 0);
            prop_assert_eq!(record.connection_count(), live.len());
            if was_online != !live.is_empty() {
                edges.push(!live.is_empty());
            }
        }

        let published: Vec<bool> = sink.events().iter().map(|e| e.is_online).collect();
        prop_assert_eq!(published, edges);
    }
}
