//! Presence store trait for pluggable backends.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::presence::{ConnectionChange, PresenceRecord, PresenceStatus, StatusChange};

/// Persistent per-user presence state, shared by every service instance.
///
/// Connection mutations must be atomic with the transition they report:
/// a backend computes "was the set empty before" and "is it empty after"
/// inside the same operation that mutates the set, never via a separate
/// read. Any error means the operation did not happen as far as the caller
/// is concerned and no presence event may be raised for it.
#[async_trait]
pub trait PresenceStore: Send + Sync + std::fmt::Debug + 'static {
    /// Idempotently add `connection_id` to the user's connection set.
    ///
    /// Returns [`Transition::CameOnline`](crate::types::Transition) only
    /// when the set was empty immediately before this insert.
    async fn add_connection(&self, user_id: &str, connection_id: &str)
    -> AppResult<ConnectionChange>;

    /// Idempotently remove `connection_id`. Removing an absent id is a no-op.
    ///
    /// Returns [`Transition::WentOffline`](crate::types::Transition) only
    /// when this removal emptied the set; `last_seen_at` is stamped in the
    /// same operation.
    async fn remove_connection(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> AppResult<ConnectionChange>;

    /// Overwrite the user's status without touching connections.
    async fn set_status(&self, user_id: &str, status: PresenceStatus) -> AppResult<StatusChange>;

    /// Point-in-time read of one user's record. Unknown users read as offline.
    async fn get(&self, user_id: &str) -> AppResult<PresenceRecord>;

    /// Read many records in as few round trips as the backend allows.
    ///
    /// The result has one entry per requested id, in request order.
    async fn get_batch(&self, user_ids: &[String]) -> AppResult<Vec<PresenceRecord>>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
