//! In-memory presence store using dashmap.
//!
//! Each mutation runs while holding the entry's shard lock, so the
//! transition it reports is computed atomically with the mutation.
//! Suitable for single-process deployments and tests only.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use herald_core::result::AppResult;
use herald_core::traits::PresenceStore;
use herald_core::types::{
    ConnectionChange, PresenceRecord, PresenceStatus, StatusChange, Transition,
};

/// In-memory presence store.
#[derive(Debug, Clone, Default)]
pub struct MemoryPresenceStore {
    /// User ID → presence record
    records: Arc<DashMap<String, PresenceRecord>>,
}

impl MemoryPresenceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users with a record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no user has a record yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    async fn add_connection(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> AppResult<ConnectionChange> {
        let mut record = self
            .records
            .entry(user_id.to_string())
            .or_insert_with(|| PresenceRecord::offline(user_id));

        let was_offline = !record.is_online();
        let inserted = record.connections.insert(connection_id.to_string());
        let transition = (was_offline && inserted).then_some(Transition::CameOnline);

        debug!(user_id, connection_id, inserted, "Connection added");
        Ok(ConnectionChange {
            transition,
            record: record.value().clone(),
        })
    }

    async fn remove_connection(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> AppResult<ConnectionChange> {
        let Some(mut record) = self.records.get_mut(user_id) else {
            return Ok(ConnectionChange {
                transition: None,
                record: PresenceRecord::offline(user_id),
            });
        };

        let removed = record.connections.remove(connection_id);
        let transition = if removed && record.connections.is_empty() {
            record.last_seen_at = Some(Utc::now());
            Some(Transition::WentOffline)
        } else {
            None
        };

        debug!(user_id, connection_id, removed, "Connection removed");
        Ok(ConnectionChange {
            transition,
            record: record.value().clone(),
        })
    }

    async fn set_status(&self, user_id: &str, status: PresenceStatus) -> AppResult<StatusChange> {
        let mut record = self
            .records
            .entry(user_id.to_string())
            .or_insert_with(|| PresenceRecord::offline(user_id));

        let previous = std::mem::replace(&mut record.status, status);
        Ok(StatusChange {
            previous,
            record: record.value().clone(),
        })
    }

    async fn get(&self, user_id: &str) -> AppResult<PresenceRecord> {
        Ok(self
            .records
            .get(user_id)
            .map(|r| r.value().clone())
            .unwrap_or_else(|| PresenceRecord::offline(user_id)))
    }

    async fn get_batch(&self, user_ids: &[String]) -> AppResult<Vec<PresenceRecord>> {
        Ok(user_ids
            .iter()
            .map(|id| {
                self.records
                    .get(id)
                    .map(|r| r.value().clone())
                    .unwrap_or_else(|| PresenceRecord::offline(id.as_str()))
            })
            .collect())
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
