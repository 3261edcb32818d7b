//! Presence-changed events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::presence::{PresenceRecord, PresenceStatus};

/// Event type and bus routing key of presence changes.
pub const PRESENCE_CHANGED: &str = "presence.changed";

/// Raised on a genuine online/offline edge or an explicit status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceChangedEvent {
    /// Always `presence.changed`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// The user whose presence changed.
    pub user_id: String,
    /// Current user-chosen status.
    pub status: PresenceStatus,
    /// Whether the user has at least one live connection.
    pub is_online: bool,
    /// Number of live connections.
    pub connection_count: usize,
    /// When the user was last seen online.
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl PresenceChangedEvent {
    /// Builds the event from a committed record.
    pub fn from_record(record: &PresenceRecord) -> Self {
        Self {
            event_type: PRESENCE_CHANGED.to_string(),
            user_id: record.user_id.clone(),
            status: record.status,
            is_online: record.is_online(),
            connection_count: record.connection_count(),
            last_seen_at: record.last_seen_at,
        }
    }
}
