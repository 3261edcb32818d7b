//! Core type definitions shared across the Herald workspace.

pub mod channel;
pub mod presence;

pub use channel::ChannelAddress;
pub use presence::{ConnectionChange, PresenceRecord, PresenceStatus, StatusChange, Transition};
