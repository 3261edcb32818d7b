//! Typed results of gateway control API calls.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use herald_core::types::ChannelAddress;

/// Result of a `publish` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    /// Stream offset, when the channel keeps history.
    #[serde(default)]
    pub offset: Option<u64>,
    /// Stream epoch, when the channel keeps history.
    #[serde(default)]
    pub epoch: Option<String>,
}

/// Per-channel outcome of a `broadcast` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Channels the gateway accepted.
    pub delivered: Vec<ChannelAddress>,
    /// Channels the gateway rejected, with the reason.
    pub failed: Vec<(ChannelAddress, String)>,
}

impl BroadcastReport {
    /// Whether every channel was accepted.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One connected client as reported by `presence`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// User id the client authenticated as.
    #[serde(default)]
    pub user: String,
    /// Gateway client id.
    pub client: String,
}

/// Result of a `presence` call: client id to client info.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPresence {
    /// Connected clients keyed by client id.
    #[serde(rename = "presence", default)]
    pub clients: HashMap<String, ClientInfo>,
}

impl ChannelPresence {
    /// Distinct users among the connected clients.
    pub fn user_ids(&self) -> Vec<&str> {
        let mut users: Vec<&str> = self.clients.values().map(|c| c.user.as_str()).collect();
        users.sort_unstable();
        users.dedup();
        users
    }
}

/// Result of a `presence_stats` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceStats {
    /// Connected clients.
    #[serde(default)]
    pub num_clients: u64,
    /// Distinct connected users.
    #[serde(default)]
    pub num_users: u64,
}
