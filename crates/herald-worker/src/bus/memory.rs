//! In-process topic exchange.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use herald_core::error::AppError;
use herald_core::result::AppResult;
use herald_core::traits::bus::topic_matches;
use herald_core::traits::{Delivery, MessageBus};

#[derive(Debug, Default)]
struct QueueState {
    bindings: Vec<String>,
    ready: VecDeque<Delivery>,
    unacked: HashMap<String, Delivery>,
}

/// In-memory bus: every declared queue receives a copy of each message
/// whose routing key matches one of its bindings.
///
/// Deliveries stay unacknowledged until [`ack`](MessageBus::ack);
/// [`requeue_unacked`](Self::requeue_unacked) hands them out again, the way
/// a broker does after a consumer crash.
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    queues: Arc<DashMap<String, QueueState>>,
    next_tag: Arc<AtomicU64>,
}

impl MemoryBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move every unacknowledged delivery of `queue` back to the front of
    /// the ready list, flagged as redelivered. Returns how many moved.
    pub fn requeue_unacked(&self, queue: &str) -> usize {
        let Some(mut state) = self.queues.get_mut(queue) else {
            return 0;
        };
        let mut pending: Vec<Delivery> = state.unacked.drain().map(|(_, d)| d).collect();
        pending.sort_by_key(|d| d.tag.parse::<u64>().unwrap_or(u64::MAX));

        let count = pending.len();
        for mut delivery in pending.into_iter().rev() {
            delivery.redelivered = true;
            state.ready.push_front(delivery);
        }
        count
    }

    /// Messages waiting to be fetched.
    pub fn ready_len(&self, queue: &str) -> usize {
        self.queues.get(queue).map(|s| s.ready.len()).unwrap_or(0)
    }

    /// Messages fetched but not yet acknowledged.
    pub fn unacked_len(&self, queue: &str) -> usize {
        self.queues.get(queue).map(|s| s.unacked.len()).unwrap_or(0)
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn declare(&self, queue: &str, patterns: &[String]) -> AppResult<()> {
        let mut state = self.queues.entry(queue.to_string()).or_default();
        for pattern in patterns {
            if !state.bindings.contains(pattern) {
                state.bindings.push(pattern.clone());
            }
        }
        debug!(queue, bindings = ?state.bindings, "Queue declared");
        Ok(())
    }

    async fn publish(&self, routing_key: &str, body: &[u8]) -> AppResult<()> {
        let tag = self.next_tag.fetch_add(1, Ordering::Relaxed).to_string();
        let mut routed = 0usize;

        for mut state in self.queues.iter_mut() {
            if state.bindings.iter().any(|p| topic_matches(p, routing_key)) {
                state.ready.push_back(Delivery {
                    tag: tag.clone(),
                    routing_key: routing_key.to_string(),
                    body: body.to_vec(),
                    redelivered: false,
                });
                routed += 1;
            }
        }

        debug!(routing_key, queues = routed, "Message published");
        Ok(())
    }

    async fn fetch(&self, queue: &str, _consumer: &str, max: usize) -> AppResult<Vec<Delivery>> {
        let mut state = self
            .queues
            .get_mut(queue)
            .ok_or_else(|| AppError::bus(format!("Queue '{queue}' is not declared")))?;

        let take = max.min(state.ready.len());
        let batch: Vec<Delivery> = state.ready.drain(..take).collect();
        for delivery in &batch {
            state.unacked.insert(delivery.tag.clone(), delivery.clone());
        }
        Ok(batch)
    }

    async fn ack(&self, queue: &str, delivery: &Delivery) -> AppResult<()> {
        let mut state = self
            .queues
            .get_mut(queue)
            .ok_or_else(|| AppError::bus(format!("Queue '{queue}' is not declared")))?;
        if state.unacked.remove(&delivery.tag).is_none() {
            debug!(queue, tag = %delivery.tag, "Ack for unknown delivery ignored");
        }
        Ok(())
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
