//! Dispatcher — drives the relay core from the transport's event stream.

use std::sync::Arc;

use tokio_stream::{Stream, StreamExt};

use crate::coordinator::{AckCoordinator, ReplayOutcome};
use crate::link::{LinkMonitor, LinkStatus};
use crate::ports::{DeviceRepository, PendingCommandStore, Transport, TransportEvent};
use crate::router::{RoutedEvent, TopicRouter};
use crate::services::presence_tracker::PresenceTracker;

/// Consumes [`TransportEvent`]s and fans them out to the coordinator and the
/// presence tracker.
///
/// Nothing that happens while handling one event can stop the loop: errors
/// are logged and the next event is processed.
pub struct Dispatcher<R, T, S> {
    coordinator: Arc<AckCoordinator<T, S>>,
    presence: PresenceTracker<R>,
    router: TopicRouter,
    link: LinkMonitor,
}

impl<R, T, S> Dispatcher<R, T, S>
where
    R: DeviceRepository,
    T: Transport,
    S: PendingCommandStore,
{
    pub fn new(devices: R, coordinator: Arc<AckCoordinator<T, S>>, link: LinkMonitor) -> Self {
        let router = TopicRouter::new(coordinator.topics().clone());
        Self {
            coordinator,
            presence: PresenceTracker::new(devices),
            router,
            link,
        }
    }

    /// Handle events until the stream ends.
    pub async fn run<E>(self, events: E)
    where
        E: Stream<Item = TransportEvent>,
    {
        let mut events = std::pin::pin!(events);
        while let Some(event) = events.next().await {
            self.handle(event).await;
        }
        self.link.set(LinkStatus::Degraded);
        tracing::info!("transport event stream ended");
    }

    /// Handle a single transport event.
    pub async fn handle(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                if let Err(err) = self.coordinator.subscribe_inbound().await {
                    tracing::error!(error = %err, "failed to subscribe to device topics");
                    return;
                }
                if self.link.set(LinkStatus::Online) != LinkStatus::Online {
                    tracing::info!("transport link online");
                }
            }
            TransportEvent::Disconnected { reason } => {
                if self.link.set(LinkStatus::Degraded) != LinkStatus::Degraded {
                    tracing::warn!(%reason, "transport link degraded");
                }
            }
            TransportEvent::Message { topic, payload } => {
                for routed in self.router.route(&topic, &payload) {
                    self.handle_routed(routed).await;
                }
            }
        }
    }

    async fn handle_routed(&self, event: RoutedEvent) {
        match event {
            RoutedEvent::Presence {
                device_id,
                online: true,
            } => {
                self.presence.mark_online(&device_id).await;
            }
            RoutedEvent::Presence {
                device_id,
                online: false,
            } => {
                self.presence.mark_offline(&device_id).await;
            }
            RoutedEvent::Acknowledgment { device_id, state } => {
                self.coordinator.on_acknowledgment(&device_id, state);
            }
            RoutedEvent::Uplink { device_id, message } => {
                tracing::debug!(
                    %device_id,
                    message = message.message.as_deref(),
                    command = message.command.as_deref(),
                    state = message.state.as_deref(),
                    "uplink received"
                );
            }
            RoutedEvent::DeviceOnline { device_id } => {
                if let Err(err) = self.coordinator.send_server_hello(&device_id).await {
                    tracing::warn!(%device_id, error = %err, "failed to answer greeting");
                }
                match self.coordinator.on_device_online(&device_id).await {
                    Ok(ReplayOutcome::Retained) => {
                        tracing::warn!(%device_id, "pending command kept for next greeting");
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::error!(%device_id, error = %err, "failed to replay pending command");
                    }
                }
            }
        }
    }
}
