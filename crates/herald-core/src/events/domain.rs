//! Domain events consumed from the message bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

use crate::types::channel::ChannelAddress;

/// A business-level occurrence carrying the users it must be fanned out to.
///
/// Only `type` and `participants` are required. The payload is kept as raw
/// JSON and forwarded without inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Event type, e.g. `message.new`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// When the upstream service produced the event, if it said so.
    ///
    /// Accepts RFC 3339 text or integer Unix seconds; anything else reads as absent.
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    /// User who caused the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    /// Chat the event belongs to, when chat-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    /// Users that must receive the event, in delivery order.
    pub participants: Vec<String>,
    /// Opaque event body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Box<RawValue>>,
    /// Routing key the event arrived under, when known.
    #[serde(skip)]
    pub routing_key: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Seconds(i64),
    Text(String),
    Other(serde::de::IgnoredAny),
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Seconds(secs) => DateTime::from_timestamp(secs, 0),
        RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        RawTimestamp::Other(_) => None,
    })
}

impl DomainEvent {
    /// Decodes an event from a bus message body.
    pub fn decode(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Personal channel of every participant, in participant order.
    pub fn participant_channels(&self) -> Vec<ChannelAddress> {
        self.participants
            .iter()
            .map(|user_id| ChannelAddress::user(user_id.as_str()))
            .collect()
    }

    /// Chat-scoped channel, when the event has a chat.
    pub fn chat_channel(&self) -> Option<ChannelAddress> {
        self.chat_id.as_deref().map(ChannelAddress::chat)
    }
}

/// The publication sent to each participant's personal channel.
#[derive(Debug, Clone, Serialize)]
pub struct RelayEnvelope<'a> {
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: &'a str,
    /// Chat identifier, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<&'a str>,
    /// Acting user, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<&'a str>,
    /// Upstream timestamp, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Untouched event payload.
    pub payload: Option<&'a RawValue>,
}

impl<'a> From<&'a DomainEvent> for RelayEnvelope<'a> {
    fn from(event: &'a DomainEvent) -> Self {
        Self {
            event_type: &event.event_type,
            chat_id: event.chat_id.as_deref(),
            actor_id: event.actor_id.as_deref(),
            timestamp: event.timestamp,
            payload: event.payload.as_deref(),
        }
    }
}
