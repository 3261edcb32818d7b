//! # herald-cache
//!
//! Presence store implementations for Herald. Supports two modes:
//!
//! - **memory**: In-process store on a [dashmap](https://crates.io/crates/dashmap),
//!   each mutation running under the per-user entry lock
//! - **redis**: Redis-backed store where each mutation is a single Lua
//!   script, so transitions stay exact across service instances
//!
//! The backend is selected at runtime based on configuration.

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use provider::PresenceStoreManager;
