//! Presence tracking and presence-changed publishing.

pub mod publisher;
pub mod sink;
pub mod tracker;

pub use publisher::PresencePublisher;
pub use sink::{BusPresenceSink, GatewayPresenceSink, PresenceSink};
pub use tracker::PresenceTracker;
