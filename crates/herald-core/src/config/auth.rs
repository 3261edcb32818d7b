//! Token signing configuration.

use serde::{Deserialize, Serialize};

/// Settings for the gateway access-token signer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared HMAC-SHA256 secret, identical to the gateway's token secret.
    #[serde(default = "default_token_secret")]
    pub token_secret: String,
    /// Connection token lifetime in seconds (0 = no `exp` claim).
    #[serde(default = "default_ttl")]
    pub connection_ttl_seconds: u64,
    /// Subscription token lifetime in seconds (0 = no `exp` claim).
    #[serde(default = "default_ttl")]
    pub subscription_ttl_seconds: u64,
    /// Clock-skew tolerance applied when verifying `exp`.
    #[serde(default)]
    pub leeway_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: default_token_secret(),
            connection_ttl_seconds: default_ttl(),
            subscription_ttl_seconds: default_ttl(),
            leeway_seconds: 0,
        }
    }
}

fn default_token_secret() -> String {
    "CHANGE_ME_IN_PRODUCTION".to_string()
}

fn default_ttl() -> u64 {
    3600
}
