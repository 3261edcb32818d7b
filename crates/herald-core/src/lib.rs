//! # herald-core
//!
//! Core crate for Herald, the presence and event fan-out service. Contains
//! configuration schemas, the shared channel namespace, the domain and
//! presence event model, the presence store and message bus traits, and
//! the unified error system.
//!
//! This crate has **no** internal dependencies on other Herald crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
