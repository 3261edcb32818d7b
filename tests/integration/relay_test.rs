//! Integration tests for the event relay.

mod helpers;

use std::time::Duration;

use herald_core::config::AppConfig;
use herald_core::traits::MessageBus;
use herald_realtime::gateway::GatewayError;
use herald_worker::RelayOutcome;
use tokio_util::sync::CancellationToken;

fn timeouts(n: usize) -> Vec<GatewayError> {
    (0..n)
        .map(|_| GatewayError::Timeout(Duration::from_secs(5)))
        .collect()
}

#[tokio::test]
async fn test_event_published_once_per_participant() {
    let app = helpers::TestHerald::new().await;
    app.publish_event("message.new", &helpers::message_event("c1", &["u1", "u2"]))
        .await;

    let outcomes = app.drain().await;
    assert_eq!(outcomes, vec![RelayOutcome::Delivered { attempted: 2, failed: 0 }]);

    for user in ["user:u1", "user:u2"] {
        let calls = app.transport.calls_to(user);
        assert_eq!(calls.len(), 1, "expected one publish to {user}");
        assert_eq!(calls[0].method, "publish");

        let data = &calls[0].params["data"];
        assert_eq!(data["type"], "message.new");
        assert_eq!(data["chat_id"], "c1");
        assert_eq!(data["payload"]["text"], "hello");
    }
    assert_eq!(app.bus.unacked_len(&app.config.bus.queue), 0);
}

#[tokio::test]
async fn test_minimal_event_shape_is_relayed() {
    let app = helpers::TestHerald::new().await;
    app.publish_event(
        "message.new",
        &serde_json::json!({
            "type": "message.new",
            "chat_id": "c1",
            "participants": ["u1", "u2"],
            "payload": {"t": 1}
        }),
    )
    .await;
    app.publish_event(
        "message.new",
        &serde_json::json!({
            "type": "message.new",
            "timestamp": 1714564800,
            "actor_id": "u3",
            "chat_id": "c1",
            "participants": ["u1", "u2"]
        }),
    )
    .await;

    let outcomes = app.drain().await;
    assert_eq!(
        outcomes,
        vec![RelayOutcome::Delivered { attempted: 2, failed: 0 }; 2]
    );
    let first = &app.transport.calls_to("user:u1")[0];
    assert_eq!(first.params["data"]["payload"]["t"], 1);
    assert!(first.params["data"].get("actor_id").is_none());

    let second = &app.transport.calls_to("user:u2")[1];
    assert_eq!(second.params["data"]["actor_id"], "u3");
    assert_eq!(second.params["data"]["timestamp"], "2024-05-01T12:00:00Z");
    assert_eq!(app.bus.unacked_len(&app.config.bus.queue), 0);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_participant_does_not_block_others() {
    let app = helpers::TestHerald::new().await;
    app.transport.fail_channel("user:u1", timeouts(4));
    app.publish_event("message.new", &helpers::message_event("c1", &["u1", "u2"]))
        .await;

    let outcomes = app.drain().await;
    assert_eq!(outcomes, vec![RelayOutcome::Delivered { attempted: 2, failed: 1 }]);

    assert_eq!(app.transport.calls_to("user:u1").len(), 4);
    assert_eq!(app.transport.calls_to("user:u2").len(), 1);
    assert_eq!(app.bus.unacked_len(&app.config.bus.queue), 0);

    let relay = app.relay.metrics().snapshot();
    assert_eq!(relay.delivered, 1);
    assert_eq!(relay.failed, 1);
    let gateway = app.engine.gateway.metrics().snapshot();
    assert_eq!(gateway.exhausted, 1);
    assert_eq!(gateway.retries, 3);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_recovers_within_budget() {
    let app = helpers::TestHerald::new().await;
    app.transport.fail_channel("user:u2", timeouts(2));
    app.publish_event("message.new", &helpers::message_event("c1", &["u1", "u2"]))
        .await;

    let outcomes = app.drain().await;
    assert_eq!(outcomes, vec![RelayOutcome::Delivered { attempted: 2, failed: 0 }]);
    assert_eq!(app.transport.calls_to("user:u2").len(), 3);
}

#[tokio::test]
async fn test_malformed_message_discarded() {
    let app = helpers::TestHerald::new().await;
    app.publish_raw("message.new", b"\x00\x01 definitely not json").await;
    app.publish_raw("message.new", br#"{"type":"message.new"}"#).await;
    app.publish_raw("message.new", br#"{"type":"message.new","participants":"u1"}"#)
        .await;

    let outcomes = app.drain().await;
    assert_eq!(outcomes, vec![RelayOutcome::Discarded; 3]);
    assert!(app.transport.calls().is_empty());
    assert_eq!(app.bus.unacked_len(&app.config.bus.queue), 0);
    assert_eq!(app.relay.metrics().snapshot().discarded, 3);
}

#[tokio::test]
async fn test_unbound_routing_keys_not_consumed() {
    let app = helpers::TestHerald::new().await;
    app.publish_event("voice.call.started", &helpers::message_event("c1", &["u1"]))
        .await;
    assert!(app.drain().await.is_empty());

    let mut config = AppConfig::default();
    config.bus.voice_enabled = true;
    let app = helpers::TestHerald::with_config(config).await;
    app.publish_event("voice.call.started", &helpers::message_event("c1", &["u1"]))
        .await;
    assert_eq!(app.drain().await.len(), 1);
}

#[tokio::test]
async fn test_unacked_message_redelivered_after_crash() {
    let app = helpers::TestHerald::new().await;
    app.publish_event("message.new", &helpers::message_event("c1", &["u1"]))
        .await;

    // Fetched by a consumer that dies before acknowledging.
    let lost = app
        .bus
        .fetch(&app.config.bus.queue, "crashed", 16)
        .await
        .unwrap();
    assert_eq!(lost.len(), 1);
    assert_eq!(app.bus.requeue_unacked(&app.config.bus.queue), 1);

    let outcomes = app.drain().await;
    assert_eq!(outcomes, vec![RelayOutcome::Delivered { attempted: 1, failed: 0 }]);
    assert_eq!(app.transport.calls_to("user:u1").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_run_consumes_until_cancelled() {
    let mut config = AppConfig::default();
    config.bus.poll_interval_ms = 10;
    let app = helpers::TestHerald::with_config(config).await;

    for i in 0..20 {
        let chat = format!("c{i}");
        app.publish_event("message.new", &helpers::message_event(&chat, &["u1", "u2"]))
            .await;
    }

    let cancel = CancellationToken::new();
    let running = {
        let relay = app.relay.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { relay.run(cancel).await })
    };

    for _ in 0..500 {
        if app.relay.metrics().snapshot().received == 20 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("relay did not stop after cancellation")
        .unwrap();

    let snap = app.relay.metrics().snapshot();
    assert_eq!(snap.received, 20);
    assert_eq!(snap.delivered, 40);
    assert_eq!(app.bus.ready_len(&app.config.bus.queue), 0);
    assert_eq!(app.bus.unacked_len(&app.config.bus.queue), 0);
}
