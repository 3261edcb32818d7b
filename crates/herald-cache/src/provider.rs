//! Store manager that dispatches to the configured presence backend.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use herald_core::config::PresenceConfig;
use herald_core::error::AppError;
use herald_core::result::AppResult;
use herald_core::traits::PresenceStore;
use herald_core::types::{ConnectionChange, PresenceRecord, PresenceStatus, StatusChange};

/// Presence store manager that wraps the configured backend.
///
/// The backend is selected at construction time based on configuration.
#[derive(Debug, Clone)]
pub struct PresenceStoreManager {
    /// The inner store.
    inner: Arc<dyn PresenceStore>,
}

impl PresenceStoreManager {
    /// Create a new store manager from configuration.
    pub async fn new(config: &PresenceConfig) -> AppResult<Self> {
        let inner: Arc<dyn PresenceStore> = match config.provider.as_str() {
            #[cfg(feature = "redis-backend")]
            "redis" => {
                info!("Initializing Redis presence store");
                let client =
                    crate::redis::RedisClient::connect(&config.redis.url, &config.redis.key_prefix)
                        .await?;
                Arc::new(crate::redis::RedisPresenceStore::new(client))
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory presence store");
                Arc::new(crate::memory::MemoryPresenceStore::new())
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown presence provider: '{other}'. Supported: memory, redis"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// Create a store manager from an existing backend (for testing).
    pub fn from_store(store: Arc<dyn PresenceStore>) -> Self {
        Self { inner: store }
    }

    /// Get a shared handle to the inner store.
    pub fn store(&self) -> Arc<dyn PresenceStore> {
        Arc::clone(&self.inner)
    }
}

#[async_trait]
impl PresenceStore for PresenceStoreManager {
    async fn add_connection(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> AppResult<ConnectionChange> {
        self.inner.add_connection(user_id, connection_id).await
    }

    async fn remove_connection(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> AppResult<ConnectionChange> {
        self.inner.remove_connection(user_id, connection_id).await
    }

    async fn set_status(&self, user_id: &str, status: PresenceStatus) -> AppResult<StatusChange> {
        self.inner.set_status(user_id, status).await
    }

    async fn get(&self, user_id: &str) -> AppResult<PresenceRecord> {
        self.inner.get(user_id).await
    }

    async fn get_batch(&self, user_ids: &[String]) -> AppResult<Vec<PresenceRecord>> {
        self.inner.get_batch(user_ids).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
