//! Channel addressing shared by the relay and the token signer.
//!
//! Every real-time destination is named by exactly one rule:
//! `user:<user_id>` for personal channels and `chat:<chat_id>` for
//! chat-scoped channels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AppError;

/// Namespace prefix for personal channels.
pub const USER_NAMESPACE: &str = "user";
/// Namespace prefix for chat-scoped channels.
pub const CHAT_NAMESPACE: &str = "chat";

/// A typed real-time channel address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelAddress {
    /// Personal channel of one user.
    User(String),
    /// Channel scoped to one chat.
    Chat(String),
}

impl ChannelAddress {
    /// Personal channel for a user.
    pub fn user(user_id: impl Into<String>) -> Self {
        Self::User(user_id.into())
    }

    /// Chat-scoped channel.
    pub fn chat(chat_id: impl Into<String>) -> Self {
        Self::Chat(chat_id.into())
    }

    /// Parses a `namespace:id` string. Unknown namespaces and empty ids are rejected.
    pub fn parse(channel: &str) -> Option<Self> {
        let (namespace, id) = channel.split_once(':')?;
        if id.is_empty() {
            return None;
        }
        match namespace {
            USER_NAMESPACE => Some(Self::User(id.to_string())),
            CHAT_NAMESPACE => Some(Self::Chat(id.to_string())),
            _ => None,
        }
    }

    /// The identifier part of the address.
    pub fn id(&self) -> &str {
        match self {
            Self::User(id) | Self::Chat(id) => id,
        }
    }
}

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "{USER_NAMESPACE}:{id}"),
            Self::Chat(id) => write!(f, "{CHAT_NAMESPACE}:{id}"),
        }
    }
}

impl FromStr for ChannelAddress {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| AppError::validation(format!("Invalid channel address: '{s}'")))
    }
}

impl Serialize for ChannelAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChannelAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid channel address '{raw}'")))
    }
}
