//! Message bus and event relay configuration.

use serde::{Deserialize, Serialize};

use super::presence::default_redis_url;

/// Inbound message bus and relay consumer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Bus provider: `"memory"` or `"redis"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Durable inbound queue name (consumer group name on Redis).
    #[serde(default = "default_queue")]
    pub queue: String,
    /// Number of concurrent relay consumers.
    #[serde(default = "default_consumers")]
    pub consumers: usize,
    /// Idle sleep between empty fetches in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Maximum deliveries fetched per poll.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Routing key patterns for chat, message, reaction and typing events.
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,
    /// Whether to also bind the voice/conference event families.
    #[serde(default)]
    pub voice_enabled: bool,
    /// Routing key patterns bound when `voice_enabled` is set.
    #[serde(default = "default_voice_patterns")]
    pub voice_patterns: Vec<String>,
    /// Redis Streams settings.
    #[serde(default)]
    pub redis: RedisBusConfig,
}

impl BusConfig {
    /// All routing key patterns the inbound queue is bound to.
    pub fn binding_patterns(&self) -> Vec<String> {
        let mut patterns = self.patterns.clone();
        if self.voice_enabled {
            patterns.extend(self.voice_patterns.iter().cloned());
        }
        patterns
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            queue: default_queue(),
            consumers: default_consumers(),
            poll_interval_ms: default_poll_interval(),
            batch_size: default_batch_size(),
            patterns: default_patterns(),
            voice_enabled: false,
            voice_patterns: default_voice_patterns(),
            redis: RedisBusConfig::default(),
        }
    }
}

/// Redis Streams bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisBusConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Stream key all domain events are appended to.
    #[serde(default = "default_stream")]
    pub stream: String,
    /// Pending entries idle at least this long are claimed by another consumer.
    #[serde(default = "default_claim_idle")]
    pub claim_idle_ms: u64,
}

impl Default for RedisBusConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            stream: default_stream(),
            claim_idle_ms: default_claim_idle(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_queue() -> String {
    "herald.realtime".to_string()
}

fn default_consumers() -> usize {
    4
}

fn default_poll_interval() -> u64 {
    200
}

fn default_batch_size() -> usize {
    16
}

fn default_patterns() -> Vec<String> {
    vec![
        "chat.#".to_string(),
        "message.#".to_string(),
        "reaction.#".to_string(),
        "typing.#".to_string(),
    ]
}

fn default_voice_patterns() -> Vec<String> {
    vec!["voice.#".to_string(), "conference.#".to_string()]
}

fn default_stream() -> String {
    "herald:events".to_string()
}

fn default_claim_idle() -> u64 {
    30_000
}
