//! # herald-auth
//!
//! Signs the compact HS256 tokens the real-time gateway accepts for
//! client connections and channel subscriptions.

pub mod token;

pub use token::{TokenClaims, TokenError, TokenSigner};
