//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod auth;
pub mod bus;
pub mod gateway;
pub mod logging;
pub mod presence;

use serde::{Deserialize, Serialize};

pub use self::auth::AuthConfig;
pub use self::bus::{BusConfig, RedisBusConfig};
pub use self::gateway::{GatewayConfig, RetryConfig};
pub use self::logging::LoggingConfig;
pub use self::presence::{PresenceConfig, RedisStoreConfig};

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Real-time gateway control API settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Token signing settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Presence store and publisher settings.
    #[serde(default)]
    pub presence: PresenceConfig,
    /// Message bus and relay settings.
    #[serde(default)]
    pub bus: BusConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `HERALD__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("HERALD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml(source: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
