//! Gateway call failures and their retry classification.

use std::time::Duration;

use thiserror::Error;

use herald_core::error::{AppError, ErrorKind};

/// The gateway's own "internal error" API code.
pub const API_CODE_INTERNAL: u32 = 100;

/// A failed gateway call.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Connection refused or reset, DNS failure, broken body stream.
    #[error("transport error: {0}")]
    Transport(String),
    /// No response within the per-request timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// Non-success HTTP status.
    #[error("gateway responded with HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },
    /// `{error: {code, message}}` reply.
    #[error("gateway error {code}: {message}")]
    Api {
        /// Gateway error code.
        code: u32,
        /// Gateway error message.
        message: String,
    },
    /// The response body was not a valid reply.
    #[error("failed to decode gateway response: {0}")]
    Decode(String),
    /// Every attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// The failure of the final attempt.
        #[source]
        last: Box<GatewayError>,
    },
}

/// Whether another attempt may succeed where this one failed.
///
/// Transport failures, timeouts, HTTP 5xx and the gateway's internal API
/// code are transient. HTTP 4xx, other API codes and decode failures mean
/// the gateway will never accept the request unchanged.
pub fn is_retryable(error: &GatewayError) -> bool {
    match error {
        GatewayError::Transport(_) | GatewayError::Timeout(_) => true,
        GatewayError::Status { status, .. } => *status >= 500,
        GatewayError::Api { code, .. } => *code == API_CODE_INTERNAL,
        GatewayError::Decode(_) | GatewayError::RetriesExhausted { .. } => false,
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        let message = err.to_string();
        AppError::with_source(ErrorKind::ExternalService, message, err)
    }
}
