//! Message bus trait for at-least-once domain event delivery.

use async_trait::async_trait;

use crate::result::AppResult;

/// A message handed to a consumer, acknowledged with [`MessageBus::ack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Backend-specific delivery handle (stream id, delivery tag).
    pub tag: String,
    /// Routing key the message was published under.
    pub routing_key: String,
    /// Raw message body.
    pub body: Vec<u8>,
    /// Whether this message was handed out before and not acknowledged.
    pub redelivered: bool,
}

/// A durable, topic-routed message bus.
///
/// Routing keys are dot-separated words. Queue bindings use topic patterns
/// where `*` matches exactly one word and `#` matches zero or more.
#[async_trait]
pub trait MessageBus: Send + Sync + std::fmt::Debug + 'static {
    /// Declare a durable queue and bind it to `patterns`. Safe to call repeatedly.
    async fn declare(&self, queue: &str, patterns: &[String]) -> AppResult<()>;

    /// Publish a message under `routing_key`.
    async fn publish(&self, routing_key: &str, body: &[u8]) -> AppResult<()>;

    /// Take up to `max` ready deliveries for `consumer` without blocking.
    async fn fetch(&self, queue: &str, consumer: &str, max: usize) -> AppResult<Vec<Delivery>>;

    /// Acknowledge a delivery so it is never redelivered.
    async fn ack(&self, queue: &str, delivery: &Delivery) -> AppResult<()>;

    /// Check that the bus is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}

/// Match a routing key against a topic pattern.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    matches_words(&pattern, &key)
}

fn matches_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| matches_words(rest, &key[skip..])),
        Some((&word, rest)) => match key.split_first() {
            Some((&head, tail)) => (word == "*" || word == head) && matches_words(rest, tail),
            None => false,
        },
    }
}
