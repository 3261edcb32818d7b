//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use herald_cache::memory::MemoryPresenceStore;
use herald_core::config::AppConfig;
use herald_core::events::PresenceChangedEvent;
use herald_core::result::AppResult;
use herald_core::traits::MessageBus;
use herald_realtime::HeraldEngine;
use herald_realtime::gateway::{ApiRequest, GatewayClient, GatewayError, GatewayTransport, RetryPolicy};
use herald_realtime::presence::PresenceSink;
use herald_worker::bus::MemoryBus;
use herald_worker::{EventRelay, RelayOutcome};

/// One call seen by [`RecordingTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// API method.
    pub method: String,
    /// `params.channel`, when present.
    pub channel: Option<String>,
    /// Decoded params.
    pub params: Value,
}

/// Gateway transport that records every attempt and replays per-channel failures.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    failures: Mutex<HashMap<String, VecDeque<GatewayError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingTransport {
    /// Make the next `errors.len()` attempts against `channel` fail.
    pub fn fail_channel(&self, channel: &str, errors: Vec<GatewayError>) {
        self.failures
            .lock()
            .unwrap()
            .entry(channel.to_string())
            .or_default()
            .extend(errors);
    }

    /// Every attempt so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Attempts against `channel`.
    pub fn calls_to(&self, channel: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.channel.as_deref() == Some(channel))
            .collect()
    }
}

#[async_trait]
impl GatewayTransport for RecordingTransport {
    async fn call(&self, request: &ApiRequest) -> Result<Value, GatewayError> {
        let params: Value = request.params_as().map_err(|e| GatewayError::Decode(e.to_string()))?;
        let channel = params
            .get("channel")
            .and_then(Value::as_str)
            .map(str::to_string);

        self.calls.lock().unwrap().push(RecordedCall {
            method: request.method.to_string(),
            channel: channel.clone(),
            params,
        });

        if let Some(channel) = channel {
            if let Some(error) = self
                .failures
                .lock()
                .unwrap()
                .get_mut(&channel)
                .and_then(VecDeque::pop_front)
            {
                return Err(error);
            }
        }
        Ok(Value::Null)
    }
}

/// Presence sink that keeps every event it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PresenceChangedEvent>>,
}

impl RecordingSink {
    /// Events received so far.
    pub fn events(&self) -> Vec<PresenceChangedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Count of online (`true`) or offline (`false`) events.
    pub fn count_online(&self, online: bool) -> usize {
        self.events().iter().filter(|e| e.is_online == online).count()
    }
}

#[async_trait]
impl PresenceSink for RecordingSink {
    async fn deliver(&self, event: &PresenceChangedEvent) -> AppResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// In-process Herald: memory store, memory bus, recording gateway.
pub struct TestHerald {
    /// Application config
    pub config: AppConfig,
    /// The bus, for publishing and inspecting queues
    pub bus: MemoryBus,
    /// The gateway fake
    pub transport: Arc<RecordingTransport>,
    /// Engine under test
    pub engine: HeraldEngine,
    /// Relay under test
    pub relay: EventRelay,
}

impl TestHerald {
    /// Create a test instance with default configuration.
    pub async fn new() -> Self {
        Self::with_config(AppConfig::default()).await
    }

    /// Create a test instance with `config`.
    pub async fn with_config(config: AppConfig) -> Self {
        let bus = MemoryBus::new();
        let transport = Arc::new(RecordingTransport::default());
        let gateway = GatewayClient::new(
            transport.clone(),
            RetryPolicy::from_config(&config.gateway.retry),
        );

        let engine = HeraldEngine::with_gateway(
            &config,
            Arc::new(MemoryPresenceStore::new()),
            Arc::new(bus.clone()),
            gateway.clone(),
        )
        .expect("Failed to build engine");

        let relay = EventRelay::new(Arc::new(bus.clone()), gateway, config.bus.clone());
        relay.setup().await.expect("Failed to declare relay queue");

        Self {
            config,
            bus,
            transport,
            engine,
            relay,
        }
    }

    /// Publish a JSON event on the bus.
    pub async fn publish_event(&self, routing_key: &str, event: &Value) {
        let body = serde_json::to_vec(event).unwrap();
        self.bus.publish(routing_key, &body).await.unwrap();
    }

    /// Publish raw bytes on the bus.
    pub async fn publish_raw(&self, routing_key: &str, body: &[u8]) {
        self.bus.publish(routing_key, body).await.unwrap();
    }

    /// Fetch and handle everything waiting in the relay queue.
    pub async fn drain(&self) -> Vec<RelayOutcome> {
        let mut outcomes = Vec::new();
        loop {
            let batch = self
                .bus
                .fetch(&self.config.bus.queue, "test", 16)
                .await
                .unwrap();
            if batch.is_empty() {
                return outcomes;
            }
            for delivery in &batch {
                outcomes.push(self.relay.handle(delivery).await);
            }
        }
    }
}

/// A `message.new` event for `participants`.
pub fn message_event(chat_id: &str, participants: &[&str]) -> Value {
    serde_json::json!({
        "type": "message.new",
        "timestamp": "2024-05-01T12:00:00Z",
        "actor_id": "author",
        "chat_id": chat_id,
        "participants": participants,
        "payload": {"message_id": "m1", "text": "hello"}
    })
}
