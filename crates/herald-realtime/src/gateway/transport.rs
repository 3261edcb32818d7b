//! Wire transport for the gateway control API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;
use tracing::info;

use herald_core::config::GatewayConfig;
use herald_core::error::{AppError, ErrorKind};
use herald_core::result::AppResult;

use super::error::GatewayError;

/// Response bodies longer than this are cut in error messages.
const MAX_ERROR_BODY: usize = 512;

/// One `{method, params}` call.
///
/// `params` is kept as serialized JSON so opaque payloads reach the
/// gateway byte-for-byte.
#[derive(Debug, Clone, Serialize)]
pub struct ApiRequest {
    /// Control API method name.
    pub method: &'static str,
    /// Serialized method parameters.
    pub params: Box<RawValue>,
}

impl ApiRequest {
    /// Serializes `params` into a request for `method`.
    pub fn new<P: Serialize + ?Sized>(method: &'static str, params: &P) -> Result<Self, GatewayError> {
        let params = serde_json::value::to_raw_value(params)
            .map_err(|e| GatewayError::Decode(format!("failed to encode params: {e}")))?;
        Ok(Self { method, params })
    }

    /// Decodes the parameters into `T`.
    pub fn params_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(self.params.get())
    }
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: u32,
    #[serde(default)]
    message: String,
}

/// Performs a single attempt of a control API call.
///
/// Implementations classify failures into [`GatewayError`] variants and
/// never retry on their own.
#[async_trait]
pub trait GatewayTransport: Send + Sync + std::fmt::Debug + 'static {
    /// Sends `request` and returns the `result` member of the reply.
    async fn call(&self, request: &ApiRequest) -> Result<Value, GatewayError>;
}

/// HTTP transport: one POST per call with `Authorization: apikey <key>`.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpTransport {
    /// Builds the HTTP client from gateway configuration.
    pub fn new(config: &GatewayConfig) -> AppResult<Self> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
            })?;

        info!(endpoint = %config.endpoint, timeout_ms = config.request_timeout_ms, "Gateway transport configured");

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl GatewayTransport for HttpTransport {
    async fn call(&self, request: &ApiRequest) -> Result<Value, GatewayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("apikey {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: truncate(body),
            });
        }

        parse_reply(&body)
    }
}

/// Splits a reply body into its `result` or its `error`.
fn parse_reply(body: &str) -> Result<Value, GatewayError> {
    let reply: ApiReply =
        serde_json::from_str(body).map_err(|e| GatewayError::Decode(e.to_string()))?;

    if let Some(error) = reply.error {
        return Err(GatewayError::Api {
            code: error.code,
            message: error.message,
        });
    }
    Ok(reply.result.unwrap_or(Value::Null))
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
