//! Message bus backends and the domain event relay for Herald.
//!
//! This crate provides:
//! - An in-process topic exchange for single-node deployments and tests
//! - A Redis Streams bus where each queue is a consumer group
//! - The event relay that fans domain events out to personal channels

pub mod bus;
pub mod relay;

pub use bus::MessageBusManager;
pub use relay::{EventRelay, RelayMetrics, RelayOutcome};
