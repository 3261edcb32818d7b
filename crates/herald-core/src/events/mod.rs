//! Events that flow through Herald.
//!
//! Domain events arrive from the message bus and are fanned out to
//! personal channels by the relay. Presence events are produced here
//! when a user crosses the online/offline boundary or changes status.

pub mod domain;
pub mod presence;

pub use domain::{DomainEvent, RelayEnvelope};
pub use presence::{PRESENCE_CHANGED, PresenceChangedEvent};
