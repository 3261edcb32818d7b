//! Claims carried by gateway tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claims payload of a connection or subscription token.
///
/// Absent options are omitted from the serialized JSON, so a connection
/// token without expiry carries only `sub`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the user id.
    pub sub: String,
    /// Expiration timestamp (seconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Channel this token grants a subscription to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl TokenClaims {
    /// Claims for a connection token.
    pub fn connection(user_id: impl Into<String>, exp: Option<i64>) -> Self {
        Self {
            sub: user_id.into(),
            exp,
            channel: None,
        }
    }

    /// Claims for a subscription token.
    pub fn subscription(
        user_id: impl Into<String>,
        channel: impl Into<String>,
        exp: Option<i64>,
    ) -> Self {
        Self {
            sub: user_id.into(),
            exp,
            channel: Some(channel.into()),
        }
    }

    /// Returns the expiration as a `DateTime<Utc>`, if any.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Whether this token is a subscription token.
    pub fn is_subscription(&self) -> bool {
        self.channel.is_some()
    }
}
