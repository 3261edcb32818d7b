//! Event relay: fans domain events from the bus out to personal channels.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use herald_core::config::BusConfig;
use herald_core::events::{DomainEvent, RelayEnvelope};
use herald_core::result::AppResult;
use herald_core::traits::{Delivery, MessageBus};
use herald_realtime::gateway::{GatewayClient, GatewayError};

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The body was not a domain event; it was acknowledged and dropped.
    Discarded,
    /// Every participant channel was attempted, then the message was acknowledged.
    Delivered {
        /// Channels attempted.
        attempted: usize,
        /// Channels whose publish failed.
        failed: usize,
    },
}

/// Relay counters.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Messages taken off the bus.
    pub received: AtomicU64,
    /// Poison messages dropped.
    pub discarded: AtomicU64,
    /// Channel publishes that succeeded.
    pub delivered: AtomicU64,
    /// Channel publishes that failed.
    pub failed: AtomicU64,
}

impl RelayMetrics {
    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> RelayMetricsSnapshot {
        RelayMetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Serializable snapshot of [`RelayMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMetricsSnapshot {
    /// Messages received
    pub received: u64,
    /// Messages discarded
    pub discarded: u64,
    /// Channel publishes delivered
    pub delivered: u64,
    /// Channel publishes failed
    pub failed: u64,
}

/// Consumes domain events and publishes them to each participant's channel.
#[derive(Debug, Clone)]
pub struct EventRelay {
    bus: Arc<dyn MessageBus>,
    gateway: GatewayClient,
    config: BusConfig,
    consumer_prefix: String,
    metrics: Arc<RelayMetrics>,
}

impl EventRelay {
    /// Create a relay.
    pub fn new(bus: Arc<dyn MessageBus>, gateway: GatewayClient, config: BusConfig) -> Self {
        Self {
            bus,
            gateway,
            config,
            consumer_prefix: "relay".to_string(),
            metrics: Arc::new(RelayMetrics::default()),
        }
    }

    /// Set the prefix of consumer names (`<prefix>-<n>`).
    pub fn with_consumer_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.consumer_prefix = prefix.into();
        self
    }

    /// Relay counters.
    pub fn metrics(&self) -> &Arc<RelayMetrics> {
        &self.metrics
    }

    /// Declare the inbound queue and bind it. Safe to call on every start.
    pub async fn setup(&self) -> AppResult<()> {
        let patterns = self.config.binding_patterns();
        self.bus.declare(&self.config.queue, &patterns).await?;
        tracing::info!(queue = %self.config.queue, ?patterns, "Relay queue declared");
        Ok(())
    }

    /// Run `consumers` workers until `cancel` fires.
    ///
    /// Cancellation is observed between batches; a fetched batch is always
    /// handled and acknowledged in full.
    pub async fn run(&self, cancel: CancellationToken) {
        let consumers = self.config.consumers.max(1);
        tracing::info!(
            queue = %self.config.queue,
            consumers,
            poll_interval_ms = self.config.poll_interval_ms,
            batch_size = self.config.batch_size,
            "Event relay started"
        );

        let mut workers = JoinSet::new();
        for index in 0..consumers {
            let relay = self.clone();
            let cancel = cancel.clone();
            workers.spawn(async move { relay.consume(index, cancel).await });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Relay consumer task failed");
            }
        }

        tracing::info!(queue = %self.config.queue, "Event relay stopped");
    }

    async fn consume(&self, index: usize, cancel: CancellationToken) {
        let consumer = format!("{}-{index}", self.consumer_prefix);
        let idle = Duration::from_millis(self.config.poll_interval_ms);
        let batch_size = self.config.batch_size.max(1);

        while !cancel.is_cancelled() {
            let batch = match self.bus.fetch(&self.config.queue, &consumer, batch_size).await {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::error!(consumer = %consumer, error = %e, "Failed to fetch from bus");
                    Vec::new()
                }
            };

            if batch.is_empty() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(idle) => {}
                }
                continue;
            }

            for delivery in &batch {
                self.handle(delivery).await;
            }
        }

        tracing::debug!(consumer = %consumer, "Relay consumer stopped");
    }

    /// Handle one delivery and acknowledge it.
    pub async fn handle(&self, delivery: &Delivery) -> RelayOutcome {
        self.metrics.received.fetch_add(1, Ordering::Relaxed);

        let mut event = match DomainEvent::decode(&delivery.body) {
            Ok(event) => event,
            Err(e) => {
                self.metrics.discarded.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    routing_key = %delivery.routing_key,
                    tag = %delivery.tag,
                    error = %e,
                    "Discarding malformed domain event"
                );
                self.ack(delivery).await;
                return RelayOutcome::Discarded;
            }
        };
        event.routing_key = Some(delivery.routing_key.clone());

        let channels = event.participant_channels();
        let envelope = RelayEnvelope::from(&event);
        let results = join_all(
            channels
                .iter()
                .map(|channel| self.gateway.publish(channel, &envelope)),
        )
        .await;

        let mut failed = 0;
        for (channel, result) in channels.iter().zip(results) {
            if let Err(e) = result {
                failed += 1;
                let attempts = match &e {
                    GatewayError::RetriesExhausted { attempts, .. } => *attempts,
                    _ => 1,
                };
                tracing::warn!(
                    channel = %channel,
                    event_type = %event.event_type,
                    attempts,
                    error = %e,
                    "Failed to relay event to channel"
                );
            }
        }

        let attempted = channels.len();
        self.metrics
            .delivered
            .fetch_add((attempted - failed) as u64, Ordering::Relaxed);
        self.metrics
            .failed
            .fetch_add(failed as u64, Ordering::Relaxed);

        tracing::debug!(
            event_type = %event.event_type,
            routing_key = %delivery.routing_key,
            attempted,
            failed,
            "Event relayed"
        );

        self.ack(delivery).await;
        RelayOutcome::Delivered { attempted, failed }
    }

    async fn ack(&self, delivery: &Delivery) {
        if let Err(e) = self.bus.ack(&self.config.queue, delivery).await {
            tracing::error!(
                tag = %delivery.tag,
                error = %e,
                "Failed to acknowledge delivery; it stays pending until the bus hands it out again"
            );
        }
    }
}
