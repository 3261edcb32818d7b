//! Presence store and publisher configuration.

use serde::{Deserialize, Serialize};

/// Presence tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Store provider: `"memory"` or `"redis"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Where presence-changed events go: `"bus"` or `"gateway"`.
    #[serde(default = "default_sink")]
    pub sink: String,
    /// Deliver presence events on a spawned task instead of inline.
    #[serde(default)]
    pub detached_notify: bool,
    /// Redis store settings.
    #[serde(default)]
    pub redis: RedisStoreConfig,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            sink: default_sink(),
            detached_notify: false,
            redis: RedisStoreConfig::default(),
        }
    }
}

/// Redis presence store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisStoreConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Key prefix for all presence keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_sink() -> String {
    "bus".to_string()
}

pub(crate) fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_key_prefix() -> String {
    "herald:".to_string()
}
