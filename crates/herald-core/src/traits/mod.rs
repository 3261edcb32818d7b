//! Core traits defined in `herald-core` and implemented by other crates.

pub mod bus;
pub mod presence_store;

pub use bus::{Delivery, MessageBus};
pub use presence_store::PresenceStore;
