//! Gateway control API client.

pub mod client;
pub mod error;
pub mod retry;
pub mod transport;
pub mod types;

pub use client::GatewayClient;
pub use error::{GatewayError, is_retryable};
pub use retry::RetryPolicy;
pub use transport::{ApiRequest, GatewayTransport, HttpTransport};
pub use types::{BroadcastReport, ChannelPresence, ClientInfo, PresenceStats, PublishResult};
