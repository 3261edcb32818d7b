//! # herald-realtime
//!
//! Real-time side of Herald. Provides:
//!
//! - A gateway control API client with bounded, jittered retries
//! - Presence tracking over a pluggable [`PresenceStore`](herald_core::traits::PresenceStore)
//! - Presence publishing on genuine online/offline edges and status changes
//! - The [`HeraldEngine`] aggregate the server binary wires together

pub mod engine;
pub mod gateway;
pub mod metrics;
pub mod presence;

pub use engine::HeraldEngine;
pub use gateway::client::GatewayClient;
pub use presence::publisher::PresencePublisher;
pub use presence::tracker::PresenceTracker;
