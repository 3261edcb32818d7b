//! Presence record, status, and transition types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User-chosen availability, independent of connectivity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    /// Reachable and accepting messages.
    #[default]
    Available,
    /// Busy but reachable.
    Busy,
    /// Marked as away.
    Away,
    /// Do not disturb.
    #[serde(rename = "dnd", alias = "do_not_disturb", alias = "do-not-disturb")]
    DoNotDisturb,
}

impl PresenceStatus {
    /// Parses a stored or user-supplied status. Returns `None` for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "available" => Some(Self::Available),
            "busy" => Some(Self::Busy),
            "away" => Some(Self::Away),
            "dnd" | "do_not_disturb" | "do-not-disturb" => Some(Self::DoNotDisturb),
            _ => None,
        }
    }

    /// Converts to the canonical stored string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Busy => "busy",
            Self::Away => "away",
            Self::DoNotDisturb => "dnd",
        }
    }
}

/// Per-user presence state.
///
/// `is_online` is derived from `connections` and is never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceRecord {
    /// The user this record belongs to.
    pub user_id: String,
    /// User-chosen status.
    pub status: PresenceStatus,
    /// Identifiers of the user's live real-time sessions.
    pub connections: BTreeSet<String>,
    /// When the connection set last became empty.
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl PresenceRecord {
    /// An offline record with the default status, as seen for a user never observed.
    pub fn offline(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            status: PresenceStatus::default(),
            connections: BTreeSet::new(),
            last_seen_at: None,
        }
    }

    /// Whether the user has at least one live connection.
    pub fn is_online(&self) -> bool {
        !self.connections.is_empty()
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

/// Serialized form of [`PresenceRecord`], carrying the derived fields for readers.
#[derive(Serialize, Deserialize)]
struct PresenceRecordView {
    user_id: String,
    status: PresenceStatus,
    connections: BTreeSet<String>,
    #[serde(default)]
    is_online: bool,
    #[serde(default)]
    connection_count: usize,
    last_seen_at: Option<DateTime<Utc>>,
}

impl Serialize for PresenceRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PresenceRecordView {
            user_id: self.user_id.clone(),
            status: self.status,
            connections: self.connections.clone(),
            is_online: self.is_online(),
            connection_count: self.connection_count(),
            last_seen_at: self.last_seen_at,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PresenceRecord {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Derived fields in the input are ignored; they are recomputed from `connections`.
        let view = PresenceRecordView::deserialize(deserializer)?;
        Ok(Self {
            user_id: view.user_id,
            status: view.status,
            connections: view.connections,
            last_seen_at: view.last_seen_at,
        })
    }
}

/// An edge across the online/offline boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// The connection set went from empty to non-empty.
    CameOnline,
    /// The connection set went from non-empty to empty.
    WentOffline,
}

/// Outcome of an atomic connection add or remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionChange {
    /// Set only when this very mutation crossed the online/offline boundary.
    pub transition: Option<Transition>,
    /// The record as committed by the mutation.
    pub record: PresenceRecord,
}

/// Outcome of a status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    /// Status before the write.
    pub previous: PresenceStatus,
    /// The record as committed by the write.
    pub record: PresenceRecord,
}

impl StatusChange {
    /// Whether the write actually changed the status.
    pub fn changed(&self) -> bool {
        self.previous != self.record.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(PresenceStatus::parse("BUSY"), Some(PresenceStatus::Busy));
        assert_eq!(PresenceStatus::parse("do-not-disturb"), Some(PresenceStatus::DoNotDisturb));
        assert_eq!(PresenceStatus::parse("offline"), None);
        assert_eq!(PresenceStatus::DoNotDisturb.as_str(), "dnd");
    }

    #[test]
    fn test_is_online_tracks_connections() {
        let mut record = PresenceRecord::offline("u1");
        assert!(!record.is_online());
        record.connections.insert("c1".to_string());
        assert!(record.is_online());
    }

    #[test]
    fn test_serialized_view_ignores_stale_is_online() {
        let record: PresenceRecord = serde_json::from_value(serde_json::json!({
            "user_id": "u1",
            "status": "away",
            "connections": [],
            "is_online": true,
            "connection_count": 3,
            "last_seen_at": null
        }))
        .unwrap();
        assert!(!record.is_online());

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["is_online"], false);
        assert_eq!(value["connection_count"], 0);
        assert_eq!(value["status"], "away");
    }
}
