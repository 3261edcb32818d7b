//! Redis Streams message bus.
//!
//! All messages go to a single stream as `{routing_key, body}` entries.
//! A queue is a consumer group on that stream; its topic bindings are kept
//! in a Redis SET and applied when entries are read, so entries outside a
//! queue's bindings are acknowledged and skipped.
//!
//! Entries left pending are handed out again in two ways: a consumer first
//! re-reads its own pending list, and an idle consumer claims entries that
//! have sat unacknowledged in any consumer for `claim_idle_ms`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::Value;
use redis::streams::{StreamAutoClaimReply, StreamId, StreamReadReply};
use tracing::{debug, info, warn};

use herald_cache::keys;
use herald_cache::redis::RedisClient;
use herald_core::config::RedisBusConfig;
use herald_core::error::{AppError, ErrorKind};
use herald_core::result::AppResult;
use herald_core::traits::bus::topic_matches;
use herald_core::traits::{Delivery, MessageBus};

const FIELD_ROUTING_KEY: &str = "routing_key";
const FIELD_BODY: &str = "body";

/// Message bus on a Redis stream with one consumer group per queue.
#[derive(Clone)]
pub struct RedisStreamBus {
    client: RedisClient,
    stream: String,
    claim_idle_ms: u64,
    /// Cached bindings per queue.
    bindings: Arc<DashMap<String, Vec<String>>>,
    /// `queue/consumer` pairs whose pending entries were already re-read.
    reclaimed: Arc<DashMap<String, ()>>,
}

impl std::fmt::Debug for RedisStreamBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamBus")
            .field("stream", &self.stream)
            .finish()
    }
}

impl RedisStreamBus {
    /// Connect to the configured Redis server.
    pub async fn connect(config: &RedisBusConfig) -> AppResult<Self> {
        let client = RedisClient::connect(&config.url, &format!("{}:", config.stream)).await?;
        Ok(Self {
            client,
            stream: config.stream.clone(),
            claim_idle_ms: config.claim_idle_ms,
            bindings: Arc::new(DashMap::new()),
            reclaimed: Arc::new(DashMap::new()),
        })
    }

    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Bus, format!("Redis stream error: {e}"), e)
    }

    async fn bindings_for(&self, queue: &str) -> AppResult<Vec<String>> {
        if let Some(cached) = self.bindings.get(queue) {
            return Ok(cached.value().clone());
        }

        let mut conn = self.client.conn_mut();
        let patterns: Vec<String> = redis::cmd("SMEMBERS")
            .arg(self.client.prefixed_key(&keys::bus_bindings(queue)))
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        if patterns.is_empty() {
            return Err(AppError::bus(format!("Queue '{queue}' is not declared")));
        }
        self.bindings.insert(queue.to_string(), patterns.clone());
        Ok(patterns)
    }

    async fn read_group(
        &self,
        queue: &str,
        consumer: &str,
        max: usize,
        id: &str,
    ) -> AppResult<Vec<StreamId>> {
        let mut conn = self.client.conn_mut();
        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(queue)
            .arg(consumer)
            .arg("COUNT")
            .arg(max)
            .arg("STREAMS")
            .arg(&self.stream)
            .arg(id)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        Ok(reply
            .map(|r| r.keys.into_iter().flat_map(|k| k.ids).collect())
            .unwrap_or_default())
    }

    /// Take over entries idle past `claim_idle_ms` in any consumer of the group.
    async fn autoclaim(&self, queue: &str, consumer: &str, max: usize) -> AppResult<Vec<StreamId>> {
        let mut conn = self.client.conn_mut();
        let reply: StreamAutoClaimReply = redis::cmd("XAUTOCLAIM")
            .arg(&self.stream)
            .arg(queue)
            .arg(consumer)
            .arg(self.claim_idle_ms)
            .arg("0-0")
            .arg("COUNT")
            .arg(max)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        if !reply.claimed.is_empty() {
            info!(queue, consumer, claimed = reply.claimed.len(), "Claimed idle pending entries");
        }
        Ok(reply.claimed)
    }

    async fn xack(&self, queue: &str, id: &str) -> AppResult<()> {
        let mut conn = self.client.conn_mut();
        let _: i64 = redis::cmd("XACK")
            .arg(&self.stream)
            .arg(queue)
            .arg(id)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }
}

/// Entries read in one fetch, split into deliveries and entries to skip.
#[derive(Debug, Default)]
struct RoutedEntries {
    deliveries: Vec<Delivery>,
    /// Stream id and reason of each entry to acknowledge without delivering.
    skipped: Vec<(String, &'static str)>,
}

fn route_entries(bindings: &[String], entries: Vec<StreamId>, redelivered: bool) -> RoutedEntries {
    let mut routed = RoutedEntries::default();
    for entry in entries {
        let routing_key =
            field_bytes(&entry, FIELD_ROUTING_KEY).and_then(|b| String::from_utf8(b).ok());
        let body = field_bytes(&entry, FIELD_BODY);

        match (routing_key, body) {
            (Some(routing_key), Some(body))
                if bindings.iter().any(|p| topic_matches(p, &routing_key)) =>
            {
                routed.deliveries.push(Delivery {
                    tag: entry.id,
                    routing_key,
                    body,
                    redelivered,
                });
            }
            (Some(_), Some(_)) => routed.skipped.push((entry.id, "outside bindings")),
            _ => routed.skipped.push((entry.id, "missing routing key or body")),
        }
    }
    routed
}

fn field_bytes(entry: &StreamId, field: &str) -> Option<Vec<u8>> {
    match entry.map.get(field)? {
        Value::BulkString(bytes) => Some(bytes.clone()),
        Value::SimpleString(s) => Some(s.clone().into_bytes()),
        _ => None,
    }
}

#[async_trait]
impl MessageBus for RedisStreamBus {
    async fn declare(&self, queue: &str, patterns: &[String]) -> AppResult<()> {
        let mut conn = self.client.conn_mut();
        let created: redis::RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream)
            .arg(queue)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match created {
            Ok(()) => info!(stream = %self.stream, queue, "Consumer group created"),
            Err(e) if e.code() == Some("BUSYGROUP") => {
                debug!(stream = %self.stream, queue, "Consumer group already exists");
            }
            Err(e) => return Err(Self::map_err(e)),
        }

        if !patterns.is_empty() {
            let _: i64 = redis::cmd("SADD")
                .arg(self.client.prefixed_key(&keys::bus_bindings(queue)))
                .arg(patterns)
                .query_async(&mut conn)
                .await
                .map_err(Self::map_err)?;
        }

        let mut cached = self.bindings.entry(queue.to_string()).or_default();
        let known: HashSet<String> = cached.iter().cloned().collect();
        cached.extend(patterns.iter().filter(|p| !known.contains(*p)).cloned());
        Ok(())
    }

    async fn publish(&self, routing_key: &str, body: &[u8]) -> AppResult<()> {
        let mut conn = self.client.conn_mut();
        let id: String = redis::cmd("XADD")
            .arg(&self.stream)
            .arg("*")
            .arg(FIELD_ROUTING_KEY)
            .arg(routing_key)
            .arg(FIELD_BODY)
            .arg(body)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        debug!(routing_key, id = %id, "Message appended to stream");
        Ok(())
    }

    async fn fetch(&self, queue: &str, consumer: &str, max: usize) -> AppResult<Vec<Delivery>> {
        let bindings = self.bindings_for(queue).await?;
        let reclaim_key = format!("{queue}/{consumer}");

        // A consumer's first reads drain what it left pending before a restart.
        let mut entries = Vec::new();
        if !self.reclaimed.contains_key(&reclaim_key) {
            entries = self.read_group(queue, consumer, max, "0").await?;
            if entries.is_empty() {
                self.reclaimed.insert(reclaim_key, ());
            }
        }
        let mut redelivered = !entries.is_empty();
        if entries.is_empty() {
            entries = self.read_group(queue, consumer, max, ">").await?;
        }
        if entries.is_empty() {
            entries = self.autoclaim(queue, consumer, max).await?;
            redelivered = true;
        }

        let routed = route_entries(&bindings, entries, redelivered);
        for (id, reason) in &routed.skipped {
            match self.xack(queue, id).await {
                Ok(()) => debug!(queue, id = %id, reason, "Stream entry skipped"),
                Err(e) => warn!(
                    queue,
                    id = %id,
                    reason,
                    error = %e,
                    "Failed to acknowledge skipped entry; it stays pending until claimed"
                ),
            }
        }
        Ok(routed.deliveries)
    }

    async fn ack(&self, queue: &str, delivery: &Delivery) -> AppResult<()> {
        self.xack(queue, &delivery.tag).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.client.ping().await.map_err(Self::map_err)
    }
}
