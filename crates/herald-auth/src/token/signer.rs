//! HS256 token signing and verification.
//!
//! Tokens are standard compact JWTs: base64url (no padding) header and
//! claims joined by `.`, followed by the base64url HMAC-SHA256 signature
//! over those two segments.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use tracing::debug;

use herald_core::config::AuthConfig;
use herald_core::error::{AppError, ErrorKind};
use herald_core::types::ChannelAddress;

use super::claims::TokenClaims;

/// Failure to sign or verify a token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The `exp` claim lies in the past.
    #[error("token has expired")]
    Expired,
    /// The signature does not match the secret.
    #[error("invalid token signature")]
    InvalidSignature,
    /// Not a well-formed token, or a claim mismatch.
    #[error("malformed token: {0}")]
    Malformed(String),
    /// Signing failed.
    #[error("failed to encode token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        let message = err.to_string();
        AppError::with_source(ErrorKind::Authentication, message, err)
    }
}

/// Builds and verifies gateway connection and subscription tokens.
#[derive(Clone)]
pub struct TokenSigner {
    /// HMAC secret key for signing.
    encoding_key: EncodingKey,
    /// HMAC secret key for verification.
    decoding_key: DecodingKey,
    /// Validation configuration.
    validation: Validation,
    /// Connection token TTL in seconds (0 = no expiry).
    connection_ttl_seconds: u64,
    /// Subscription token TTL in seconds (0 = no expiry).
    subscription_ttl_seconds: u64,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("connection_ttl_seconds", &self.connection_ttl_seconds)
            .field("subscription_ttl_seconds", &self.subscription_ttl_seconds)
            .finish()
    }
}

impl TokenSigner {
    /// Creates a signer from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is optional; it is still checked whenever present.
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        validation.leeway = config.leeway_seconds;

        Self {
            encoding_key: EncodingKey::from_secret(config.token_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.token_secret.as_bytes()),
            validation,
            connection_ttl_seconds: config.connection_ttl_seconds,
            subscription_ttl_seconds: config.subscription_ttl_seconds,
        }
    }

    /// Signs a connection token `{sub, exp?}`.
    pub fn connection_token(&self, user_id: &str, exp: Option<i64>) -> Result<String, TokenError> {
        self.sign(&TokenClaims::connection(user_id, exp))
    }

    /// Signs a subscription token `{sub, channel, exp?}`.
    pub fn subscription_token(
        &self,
        user_id: &str,
        channel: &str,
        exp: Option<i64>,
    ) -> Result<String, TokenError> {
        self.sign(&TokenClaims::subscription(user_id, channel, exp))
    }

    /// Signs a connection token expiring after the configured TTL.
    pub fn issue_connection_token(&self, user_id: &str) -> Result<String, TokenError> {
        let exp = expiry_after(self.connection_ttl_seconds);
        debug!(user_id, ?exp, "Issuing connection token");
        self.connection_token(user_id, exp)
    }

    /// Signs a subscription token for `channel` expiring after the configured TTL.
    pub fn issue_subscription_token(
        &self,
        user_id: &str,
        channel: &ChannelAddress,
    ) -> Result<String, TokenError> {
        let exp = expiry_after(self.subscription_ttl_seconds);
        debug!(user_id, channel = %channel, ?exp, "Issuing subscription token");
        self.subscription_token(user_id, &channel.to_string(), exp)
    }

    /// Verifies the signature and, when present, the expiry.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                JwtErrorKind::ExpiredSignature => TokenError::Expired,
                JwtErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed(e.to_string()),
            },
        )?;
        Ok(data.claims)
    }

    /// Verifies a subscription token and requires its `channel` claim to match.
    pub fn verify_subscription(
        &self,
        token: &str,
        channel: &ChannelAddress,
    ) -> Result<TokenClaims, TokenError> {
        let claims = self.verify(token)?;
        let expected = channel.to_string();
        match claims.channel.as_deref() {
            Some(actual) if actual == expected => Ok(claims),
            Some(actual) => Err(TokenError::Malformed(format!(
                "token is scoped to '{actual}', not '{expected}'"
            ))),
            None => Err(TokenError::Malformed(
                "connection token used for a subscription".to_string(),
            )),
        }
    }

    fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(TokenError::Encoding)
    }
}

fn expiry_after(ttl_seconds: u64) -> Option<i64> {
    if ttl_seconds == 0 {
        return None;
    }
    let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
    Some(Utc::now().timestamp().saturating_add(ttl))
}
