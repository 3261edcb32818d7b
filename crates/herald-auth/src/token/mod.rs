//! Connection and subscription tokens.

pub mod claims;
pub mod signer;

pub use claims::TokenClaims;
pub use signer::{TokenError, TokenSigner};
