//! Presence publisher: commit state, then best-effort notify.

use std::sync::Arc;

use tracing::{debug, warn};

use herald_core::events::PresenceChangedEvent;
use herald_core::result::AppResult;
use herald_core::types::{ConnectionChange, PresenceStatus, StatusChange};

use super::sink::PresenceSink;
use super::tracker::PresenceTracker;
use crate::metrics::PublisherMetrics;

/// Wraps the tracker and raises presence-changed events.
///
/// An event is raised only on an online/offline edge or an explicit status
/// change. Delivery happens after the state change has been committed and
/// its failure never propagates to the caller.
#[derive(Debug, Clone)]
pub struct PresencePublisher {
    tracker: PresenceTracker,
    sink: Arc<dyn PresenceSink>,
    metrics: Arc<PublisherMetrics>,
    detached: bool,
}

impl PresencePublisher {
    /// Create a publisher delivering inline.
    pub fn new(tracker: PresenceTracker, sink: Arc<dyn PresenceSink>) -> Self {
        Self {
            tracker,
            sink,
            metrics: Arc::new(PublisherMetrics::new()),
            detached: false,
        }
    }

    /// Deliver on a spawned task instead of inline.
    pub fn detached(mut self, detached: bool) -> Self {
        self.detached = detached;
        self
    }

    /// The wrapped tracker.
    pub fn tracker(&self) -> &PresenceTracker {
        &self.tracker
    }

    /// Publisher counters.
    pub fn metrics(&self) -> &Arc<PublisherMetrics> {
        &self.metrics
    }

    /// A connection opened.
    pub async fn connect(&self, user_id: &str, connection_id: &str) -> AppResult<ConnectionChange> {
        let change = self.tracker.add_connection(user_id, connection_id).await?;
        if change.transition.is_some() {
            self.notify(PresenceChangedEvent::from_record(&change.record))
                .await;
        }
        Ok(change)
    }

    /// A connection closed.
    pub async fn disconnect(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> AppResult<ConnectionChange> {
        let change = self
            .tracker
            .remove_connection(user_id, connection_id)
            .await?;
        if change.transition.is_some() {
            self.notify(PresenceChangedEvent::from_record(&change.record))
                .await;
        }
        Ok(change)
    }

    /// The user picked a status.
    pub async fn set_status(&self, user_id: &str, status: PresenceStatus) -> AppResult<StatusChange> {
        let change = self.tracker.set_status(user_id, status).await?;
        if change.changed() {
            self.notify(PresenceChangedEvent::from_record(&change.record))
                .await;
        }
        Ok(change)
    }

    async fn notify(&self, event: PresenceChangedEvent) {
        PublisherMetrics::inc(&self.metrics.raised);

        if self.detached {
            let sink = self.sink.clone();
            let metrics = self.metrics.clone();
            tokio::spawn(async move {
                deliver(sink.as_ref(), &metrics, &event).await;
            });
        } else {
            deliver(self.sink.as_ref(), &self.metrics, &event).await;
        }
    }
}

async fn deliver(sink: &dyn PresenceSink, metrics: &PublisherMetrics, event: &PresenceChangedEvent) {
    match sink.deliver(event).await {
        Ok(()) => {
            PublisherMetrics::inc(&metrics.published);
            debug!(
                user_id = %event.user_id,
                is_online = event.is_online,
                status = event.status.as_str(),
                "Presence change published"
            );
        }
        Err(e) => {
            PublisherMetrics::inc(&metrics.failed);
            warn!(
                user_id = %event.user_id,
                is_online = event.is_online,
                error = %e,
                "Failed to publish presence change"
            );
        }
    }
}
