//! Top-level engine that ties the real-time subsystems together.

use std::sync::Arc;

use tracing::info;

use herald_auth::TokenSigner;
use herald_core::config::AppConfig;
use herald_core::result::AppResult;
use herald_core::traits::{MessageBus, PresenceStore};

use crate::gateway::GatewayClient;
use crate::presence::publisher::PresencePublisher;
use crate::presence::sink;
use crate::presence::tracker::PresenceTracker;

/// Shared handles to the gateway client, token signer and presence services.
#[derive(Clone)]
pub struct HeraldEngine {
    /// Gateway control API client.
    pub gateway: GatewayClient,
    /// Connection and subscription token signer.
    pub tokens: Arc<TokenSigner>,
    /// Presence tracker.
    pub tracker: PresenceTracker,
    /// Presence publisher.
    pub publisher: Arc<PresencePublisher>,
    /// Inbound and presence message bus.
    pub bus: Arc<dyn MessageBus>,
}

impl std::fmt::Debug for HeraldEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeraldEngine").finish()
    }
}

impl HeraldEngine {
    /// Builds the engine with an HTTP gateway client from configuration.
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn PresenceStore>,
        bus: Arc<dyn MessageBus>,
    ) -> AppResult<Self> {
        let gateway = GatewayClient::from_config(&config.gateway)?;
        Self::with_gateway(config, store, bus, gateway)
    }

    /// Builds the engine around an existing gateway client.
    pub fn with_gateway(
        config: &AppConfig,
        store: Arc<dyn PresenceStore>,
        bus: Arc<dyn MessageBus>,
        gateway: GatewayClient,
    ) -> AppResult<Self> {
        let tokens = Arc::new(TokenSigner::new(&config.auth));
        let tracker = PresenceTracker::new(store);
        let sink = sink::from_config(&config.presence, bus.clone(), gateway.clone())?;
        let publisher = Arc::new(
            PresencePublisher::new(tracker.clone(), sink).detached(config.presence.detached_notify),
        );

        info!(
            presence_sink = %config.presence.sink,
            detached_notify = config.presence.detached_notify,
            "Herald engine initialized"
        );

        Ok(Self {
            gateway,
            tokens,
            tracker,
            publisher,
            bus,
        })
    }

    /// Whether the presence store and the bus are both reachable.
    pub async fn health_check(&self) -> AppResult<bool> {
        let store = self.tracker.health_check().await?;
        let bus = self.bus.health_check().await?;
        Ok(store && bus)
    }
}
