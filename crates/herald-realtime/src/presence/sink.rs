//! Destinations for presence-changed events.

use std::sync::Arc;

use async_trait::async_trait;

use herald_core::config::PresenceConfig;
use herald_core::error::AppError;
use herald_core::events::{PRESENCE_CHANGED, PresenceChangedEvent};
use herald_core::result::AppResult;
use herald_core::traits::MessageBus;
use herald_core::types::ChannelAddress;

use crate::gateway::GatewayClient;

/// Receives presence-changed events after the state change is committed.
#[async_trait]
pub trait PresenceSink: Send + Sync + std::fmt::Debug + 'static {
    /// Deliver one event.
    async fn deliver(&self, event: &PresenceChangedEvent) -> AppResult<()>;
}

/// Publishes presence events onto the message bus under `presence.changed`.
#[derive(Debug, Clone)]
pub struct BusPresenceSink {
    bus: Arc<dyn MessageBus>,
}

impl BusPresenceSink {
    /// Create a bus sink.
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl PresenceSink for BusPresenceSink {
    async fn deliver(&self, event: &PresenceChangedEvent) -> AppResult<()> {
        let body = serde_json::to_vec(event)?;
        self.bus.publish(PRESENCE_CHANGED, &body).await
    }
}

/// Publishes presence events straight to the user's personal channel.
#[derive(Debug, Clone)]
pub struct GatewayPresenceSink {
    gateway: GatewayClient,
}

impl GatewayPresenceSink {
    /// Create a gateway sink.
    pub fn new(gateway: GatewayClient) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl PresenceSink for GatewayPresenceSink {
    async fn deliver(&self, event: &PresenceChangedEvent) -> AppResult<()> {
        let channel = ChannelAddress::user(event.user_id.as_str());
        self.gateway.publish(&channel, event).await?;
        Ok(())
    }
}

/// Select the sink named by `presence.sink`.
pub fn from_config(
    config: &PresenceConfig,
    bus: Arc<dyn MessageBus>,
    gateway: GatewayClient,
) -> AppResult<Arc<dyn PresenceSink>> {
    match config.sink.as_str() {
        "bus" => Ok(Arc::new(BusPresenceSink::new(bus))),
        "gateway" => Ok(Arc::new(GatewayPresenceSink::new(gateway))),
        other => Err(AppError::configuration(format!(
            "Unknown presence sink: '{other}'. Supported: bus, gateway"
        ))),
    }
}
