//! Gateway control API client with bounded, jittered retries.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use herald_core::config::GatewayConfig;
use herald_core::result::AppResult;
use herald_core::types::ChannelAddress;

use super::error::{GatewayError, is_retryable};
use super::retry::RetryPolicy;
use super::transport::{ApiRequest, GatewayTransport, HttpTransport};
use super::types::{BroadcastReport, ChannelPresence, PresenceStats, PublishResult};
use crate::metrics::GatewayMetrics;

#[derive(Serialize)]
struct PublishParams<'a, T: ?Sized> {
    channel: String,
    data: &'a T,
}

#[derive(Serialize)]
struct BroadcastParams<'a, T: ?Sized> {
    channels: Vec<String>,
    data: &'a T,
}

#[derive(Serialize)]
struct ChannelParams {
    channel: String,
}

#[derive(Serialize)]
struct UserParams<'a> {
    user: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
}

#[derive(Serialize)]
struct NoParams {}

/// Client for the gateway control API.
///
/// Every method is one logical call wrapped in the retry loop: up to
/// `1 + max_retries` transport attempts, sleeping a jittered exponential
/// delay between them. Non-retryable failures return after one attempt.
#[derive(Clone)]
pub struct GatewayClient {
    transport: Arc<dyn GatewayTransport>,
    policy: RetryPolicy,
    metrics: Arc<GatewayMetrics>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("transport", &self.transport)
            .field("policy", &self.policy)
            .finish()
    }
}

impl GatewayClient {
    /// Creates a client over an arbitrary transport.
    pub fn new(transport: Arc<dyn GatewayTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            metrics: Arc::new(GatewayMetrics::new()),
        }
    }

    /// Creates an HTTP client from configuration.
    pub fn from_config(config: &GatewayConfig) -> AppResult<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(
            Arc::new(transport),
            RetryPolicy::from_config(&config.retry),
        ))
    }

    /// Retry policy in use.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Client counters.
    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    /// Publishes `data` into `channel`.
    pub async fn publish<T: Serialize + ?Sized>(
        &self,
        channel: &ChannelAddress,
        data: &T,
    ) -> Result<PublishResult, GatewayError> {
        let request = ApiRequest::new(
            "publish",
            &PublishParams {
                channel: channel.to_string(),
                data,
            },
        )?;
        let result = self.call(&request).await?;
        decode_or_default(result)
    }

    /// Publishes `data` into several channels with one call.
    ///
    /// A successful reply may still reject individual channels; those land
    /// in [`BroadcastReport::failed`] without failing the others. A reply
    /// that does not answer every channel is a [`GatewayError::Decode`].
    pub async fn broadcast<T: Serialize + ?Sized>(
        &self,
        channels: &[ChannelAddress],
        data: &T,
    ) -> Result<BroadcastReport, GatewayError> {
        if channels.is_empty() {
            return Ok(BroadcastReport::default());
        }

        let request = ApiRequest::new(
            "broadcast",
            &BroadcastParams {
                channels: channels.iter().map(ToString::to_string).collect(),
                data,
            },
        )?;
        let result = self.call(&request).await?;
        broadcast_report(channels, &result)
    }

    /// Removes `user` from `channel` on every node.
    pub async fn unsubscribe(
        &self,
        user_id: &str,
        channel: &ChannelAddress,
    ) -> Result<(), GatewayError> {
        let request = ApiRequest::new(
            "unsubscribe",
            &UserParams {
                user: user_id,
                channel: Some(channel.to_string()),
            },
        )?;
        self.call(&request).await.map(|_| ())
    }

    /// Closes every connection of `user`.
    pub async fn disconnect(&self, user_id: &str) -> Result<(), GatewayError> {
        let request = ApiRequest::new(
            "disconnect",
            &UserParams {
                user: user_id,
                channel: None,
            },
        )?;
        self.call(&request).await.map(|_| ())
    }

    /// Clients currently subscribed to `channel`.
    pub async fn presence(&self, channel: &ChannelAddress) -> Result<ChannelPresence, GatewayError> {
        let request = ApiRequest::new(
            "presence",
            &ChannelParams {
                channel: channel.to_string(),
            },
        )?;
        decode_or_default(self.call(&request).await?)
    }

    /// Client and user counts for `channel`.
    pub async fn presence_stats(
        &self,
        channel: &ChannelAddress,
    ) -> Result<PresenceStats, GatewayError> {
        let request = ApiRequest::new(
            "presence_stats",
            &ChannelParams {
                channel: channel.to_string(),
            },
        )?;
        decode_or_default(self.call(&request).await?)
    }

    /// Gateway node information, as returned.
    pub async fn info(&self) -> Result<Value, GatewayError> {
        let request = ApiRequest::new("info", &NoParams {})?;
        self.call(&request).await
    }

    async fn call(&self, request: &ApiRequest) -> Result<Value, GatewayError> {
        GatewayMetrics::inc(&self.metrics.calls);
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1;

        loop {
            GatewayMetrics::inc(&self.metrics.attempts);

            let error = match self.transport.call(request).await {
                Ok(result) => {
                    GatewayMetrics::inc(&self.metrics.succeeded);
                    return Ok(result);
                }
                Err(e) => e,
            };

            if !is_retryable(&error) {
                GatewayMetrics::inc(&self.metrics.fatal);
                debug!(method = request.method, attempt, error = %error, "Gateway call failed, not retryable");
                return Err(error);
            }

            if attempt >= max_attempts {
                GatewayMetrics::inc(&self.metrics.exhausted);
                warn!(method = request.method, attempts = attempt, error = %error, "Gateway call failed, retries exhausted");
                return Err(GatewayError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let delay = self.policy.delay(attempt);
            debug!(
                method = request.method,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Gateway call failed, retrying"
            );
            GatewayMetrics::inc(&self.metrics.retries);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn decode_or_default<T: DeserializeOwned + Default>(value: Value) -> Result<T, GatewayError> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value).map_err(|e| GatewayError::Decode(e.to_string()))
}

/// Pairs `{responses: [...]}` with the requested channels, in order.
fn broadcast_report(
    channels: &[ChannelAddress],
    result: &Value,
) -> Result<BroadcastReport, GatewayError> {
    let responses = result
        .get("responses")
        .and_then(Value::as_array)
        .ok_or_else(|| GatewayError::Decode("broadcast reply has no responses".to_string()))?;
    if responses.len() != channels.len() {
        return Err(GatewayError::Decode(format!(
            "broadcast reply has {} responses for {} channels",
            responses.len(),
            channels.len()
        )));
    }

    let mut report = BroadcastReport::default();
    for (channel, response) in channels.iter().zip(responses) {
        match response.get("error").filter(|e| !e.is_null()) {
            Some(error) => {
                let reason = GatewayError::Api {
                    code: error
                        .get("code")
                        .and_then(Value::as_u64)
                        .and_then(|c| u32::try_from(c).ok())
                        .unwrap_or_default(),
                    message: error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                };
                report.failed.push((channel.clone(), reason.to_string()));
            }
            None => report.delivered.push(channel.clone()),
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;

    /// Replays scripted replies and records when each attempt happened.
    #[derive(Debug, Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<Value, GatewayError>>>,
        calls: Mutex<Vec<(String, Value, Instant)>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<Value, GatewayError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::default(),
            })
        }

        fn calls(&self) -> Vec<(String, Value, Instant)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GatewayTransport for ScriptedTransport {
        async fn call(&self, request: &ApiRequest) -> Result<Value, GatewayError> {
            let params: Value = request.params_as().unwrap();
            self.calls
                .lock()
                .unwrap()
                .push((request.method.to_string(), params, Instant::now()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Value::Null))
        }
    }

    fn timeout() -> GatewayError {
        GatewayError::Timeout(Duration::from_secs(5))
    }

    fn client(transport: Arc<ScriptedTransport>) -> GatewayClient {
        GatewayClient::new(transport, RetryPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_timeouts_then_succeeds() {
        let transport = ScriptedTransport::new(vec![
            Err(timeout()),
            Err(timeout()),
            Err(timeout()),
            Ok(serde_json::json!({"offset": 7, "epoch": "ab"})),
        ]);
        let client = client(transport.clone());

        let result = client
            .publish(&ChannelAddress::user("u1"), &serde_json::json!({"x": 1}))
            .await
            .unwrap();
        assert_eq!(result.offset, Some(7));

        let calls = transport.calls();
        assert_eq!(calls.len(), 4);
        for (retry, pair) in calls.windows(2).enumerate() {
            let gap = pair[1].2 - pair[0].2;
            let (lo, hi) = client.policy().bounds(retry as u32 + 1);
            // The paused clock rounds sleeps up to the next millisecond.
            assert!(
                gap >= lo && gap <= hi + Duration::from_millis(1),
                "retry {retry}: {gap:?} outside {lo:?}..{hi:?}"
            );
        }

        let snap = client.metrics().snapshot();
        assert_eq!(snap.attempts, 4);
        assert_eq!(snap.retries, 3);
        assert_eq!(snap.succeeded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Err(GatewayError::Status {
            status: 400,
            body: "bad request".into(),
        })]);
        let client = client(transport.clone());

        let err = client.disconnect("u1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Status { status: 400, .. }));
        assert_eq!(transport.calls().len(), 1);
        assert_eq!(client.metrics().snapshot().fatal, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_wraps_last_error() {
        let transport = ScriptedTransport::new(vec![
            Err(timeout()),
            Err(timeout()),
            Err(timeout()),
            Err(GatewayError::Status {
                status: 503,
                body: String::new(),
            }),
            Ok(Value::Null),
        ]);
        let client = client(transport.clone());

        let err = client
            .publish(&ChannelAddress::user("u1"), "hello")
            .await
            .unwrap_err();
        match err {
            GatewayError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 4);
                assert!(matches!(*last, GatewayError::Status { status: 503, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_publish_params_shape() {
        let transport = ScriptedTransport::new(vec![]);
        let client = client(transport.clone());

        client
            .publish(&ChannelAddress::chat("c1"), &serde_json::json!({"text": "hi"}))
            .await
            .unwrap();
        client
            .unsubscribe("u1", &ChannelAddress::chat("c1"))
            .await
            .unwrap();

        let calls = transport.calls();
        assert_eq!(calls[0].0, "publish");
        assert_eq!(
            calls[0].1,
            serde_json::json!({"channel": "chat:c1", "data": {"text": "hi"}})
        );
        assert_eq!(calls[1].0, "unsubscribe");
        assert_eq!(calls[1].1, serde_json::json!({"user": "u1", "channel": "chat:c1"}));
    }

    #[tokio::test]
    async fn test_broadcast_isolates_channel_errors() {
        let transport = ScriptedTransport::new(vec![Ok(serde_json::json!({
            "responses": [
                {"result": {}},
                {"error": {"code": 102, "message": "unknown channel"}},
                {"result": {"offset": 1}}
            ]
        }))]);
        let client = client(transport.clone());
        let channels = vec![
            ChannelAddress::user("u1"),
            ChannelAddress::user("u2"),
            ChannelAddress::user("u3"),
        ];

        let report = client.broadcast(&channels, "ping").await.unwrap();
        assert_eq!(report.delivered, vec![channels[0].clone(), channels[2].clone()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, channels[1]);
        assert!(report.failed[0].1.contains("unknown channel"));
        assert!(!report.is_complete());

        let empty = client.broadcast(&[], "ping").await.unwrap();
        assert!(empty.is_complete());
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_reply_must_cover_every_channel() {
        let transport = ScriptedTransport::new(vec![
            Ok(Value::Null),
            Ok(serde_json::json!({"responses": [{"result": {}}]})),
        ]);
        let client = client(transport.clone());
        let channels = vec![ChannelAddress::user("u1"), ChannelAddress::user("u2")];

        assert!(matches!(
            client.broadcast(&channels, "ping").await,
            Err(GatewayError::Decode(_))
        ));
        assert!(matches!(
            client.broadcast(&channels, "ping").await,
            Err(GatewayError::Decode(_))
        ));
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_presence_decoding() {
        let transport = ScriptedTransport::new(vec![
            Ok(serde_json::json!({
                "presence": {
                    "c-1": {"client": "c-1", "user": "u1"},
                    "c-2": {"client": "c-2", "user": "u1"},
                    "c-3": {"client": "c-3", "user": "u2"}
                }
            })),
            Ok(serde_json::json!({"num_clients": 3, "num_users": 2})),
            Ok(serde_json::json!({"presence": 12})),
        ]);
        let client = client(transport);
        let channel = ChannelAddress::chat("c1");

        let presence = client.presence(&channel).await.unwrap();
        assert_eq!(presence.clients.len(), 3);
        assert_eq!(presence.user_ids(), vec!["u1", "u2"]);

        let stats = client.presence_stats(&channel).await.unwrap();
        assert_eq!(stats.num_users, 2);

        assert!(matches!(
            client.presence(&channel).await,
            Err(GatewayError::Decode(_))
        ));
    }
}
