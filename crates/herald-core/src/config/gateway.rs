//! Real-time gateway control API configuration.

use serde::{Deserialize, Serialize};

/// Settings for the gateway control API client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Control API endpoint (single POST URL).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Static API key sent as `Authorization: apikey <key>`.
    #[serde(default)]
    pub api_key: String,
    /// Per-attempt request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// Retry and back-off settings.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            request_timeout_ms: default_request_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// Bounded exponential back-off with symmetric jitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    /// Upper bound on the un-jittered delay in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Jitter factor; a delay `d` is randomized within `d * (1 ± jitter)`.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            jitter: default_jitter(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_request_timeout() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    100
}

fn default_max_delay() -> u64 {
    5000
}

fn default_jitter() -> f64 {
    0.25
}
