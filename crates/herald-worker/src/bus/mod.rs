//! Message bus backends.

pub mod memory;
#[cfg(feature = "redis-bus")]
pub mod redis;

use std::sync::Arc;

use herald_core::config::BusConfig;
use herald_core::error::AppError;
use herald_core::result::AppResult;
use herald_core::traits::MessageBus;
use tracing::info;

pub use memory::MemoryBus;

/// Selects the bus backend named by `bus.provider`.
#[derive(Debug)]
pub struct MessageBusManager;

impl MessageBusManager {
    /// Build the configured bus.
    pub async fn connect(config: &BusConfig) -> AppResult<Arc<dyn MessageBus>> {
        let bus: Arc<dyn MessageBus> = match config.provider.as_str() {
            #[cfg(feature = "redis-bus")]
            "redis" => {
                info!(stream = %config.redis.stream, "Using Redis Streams message bus");
                Arc::new(self::redis::RedisStreamBus::connect(&config.redis).await?)
            }
            "memory" => {
                info!("Using in-memory message bus");
                Arc::new(MemoryBus::new())
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown bus provider: '{other}'. Supported: memory, redis"
                )));
            }
        };
        Ok(bus)
    }
}
