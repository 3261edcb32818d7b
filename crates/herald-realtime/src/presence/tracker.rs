//! Presence tracker: logged facade over the shared presence store.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use herald_core::error::AppError;
use herald_core::result::AppResult;
use herald_core::traits::PresenceStore;
use herald_core::types::{ConnectionChange, PresenceRecord, PresenceStatus, StatusChange, Transition};

/// Tracks connections and status for every user.
///
/// All state lives in the store, so any number of tracker instances across
/// processes may run against the same backend.
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    store: Arc<dyn PresenceStore>,
}

impl PresenceTracker {
    /// Create a tracker over `store`.
    pub fn new(store: Arc<dyn PresenceStore>) -> Self {
        Self { store }
    }

    /// Record a new live connection.
    pub async fn add_connection(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> AppResult<ConnectionChange> {
        validate(user_id, connection_id)?;
        let change = self.store.add_connection(user_id, connection_id).await?;

        if change.transition == Some(Transition::CameOnline) {
            info!(user_id, connection_id, "User came online");
        } else {
            debug!(
                user_id,
                connection_id,
                connections = change.record.connection_count(),
                "Connection added"
            );
        }
        Ok(change)
    }

    /// Record a closed connection. Unknown connections are a no-op.
    pub async fn remove_connection(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> AppResult<ConnectionChange> {
        validate(user_id, connection_id)?;
        let change = self.store.remove_connection(user_id, connection_id).await?;

        if change.transition == Some(Transition::WentOffline) {
            info!(user_id, connection_id, "User went offline");
        } else {
            debug!(
                user_id,
                connection_id,
                connections = change.record.connection_count(),
                "Connection removed"
            );
        }
        Ok(change)
    }

    /// Whether the user has any live connection right now.
    pub async fn is_online(&self, user_id: &str) -> AppResult<bool> {
        Ok(self.store.get(user_id).await?.is_online())
    }

    /// Overwrite the user's status.
    pub async fn set_status(&self, user_id: &str, status: PresenceStatus) -> AppResult<StatusChange> {
        if user_id.is_empty() {
            return Err(AppError::validation("user id must not be empty"));
        }
        let change = self.store.set_status(user_id, status).await?;
        debug!(
            user_id,
            previous = change.previous.as_str(),
            status = status.as_str(),
            "Status set"
        );
        Ok(change)
    }

    /// Read one user's record.
    pub async fn get_presence(&self, user_id: &str) -> AppResult<PresenceRecord> {
        self.store.get(user_id).await
    }

    /// Read several users at once.
    ///
    /// Duplicate ids are collapsed; the first occurrence keeps its position.
    pub async fn get_presence_batch(&self, user_ids: &[String]) -> AppResult<Vec<PresenceRecord>> {
        let mut seen = HashSet::with_capacity(user_ids.len());
        let unique: Vec<String> = user_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();
        self.store.get_batch(&unique).await
    }

    /// Check that the store is reachable.
    pub async fn health_check(&self) -> AppResult<bool> {
        self.store.health_check().await
    }
}

fn validate(user_id: &str, connection_id: &str) -> AppResult<()> {
    if user_id.is_empty() {
        return Err(AppError::validation("user id must not be empty"));
    }
    if connection_id.is_empty() {
        return Err(AppError::validation("connection id must not be empty"));
    }
    Ok(())
}
