//! Acknowledgment coordinator — send a command, wait for the device to
//! confirm it, or park it in the pending store for replay.
//!
//! ## Send path
//! 1. Build the `set_state` payload.
//! 2. Register a waiter for `(device, state)`. This happens **before** the
//!    publish so an ack can never overtake its waiter.
//! 3. Publish on the device's downlink topic. A failed publish skips the wait.
//! 4. Wait for the waiter, bounded by the ack timeout.
//! 5. Unacknowledged commands are saved as the device's pending command; an
//!    acknowledged one clears whatever was pending before it.
//!
//! ## Replay path
//! When a device greets us, its pending command is republished and cleared
//! only after the publish succeeded. A failed republish leaves it for the
//! next greeting.

use std::time::Duration;

use relayhub_domain::error::RelayError;
use relayhub_domain::id::DeviceId;
use relayhub_domain::message::{self, SetStateCommand};
use relayhub_domain::pending::PendingCommand;
use relayhub_domain::state::DeviceState;
use relayhub_domain::topic::{TopicKind, TopicScheme};

use crate::ports::{PendingCommandStore, PublishOptions, QoS, Transport};
use crate::services::pending_commands::PendingCommands;
use crate::waiter::WaiterRegistry;

/// Default time a device has to acknowledge a command.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// What happened to a device's pending command on replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Nothing was pending.
    NothingPending,
    /// Republished and cleared.
    Delivered,
    /// Republish failed; the command stays pending.
    Retained,
}

/// Owns the waiter registry and the pending-command service.
///
/// One instance is shared (behind an `Arc`) by the relay service and the
/// inbound dispatcher.
pub struct AckCoordinator<T, S> {
    transport: T,
    pending: PendingCommands<S>,
    waiters: WaiterRegistry,
    topics: TopicScheme,
    ack_timeout: Duration,
}

impl<T, S> AckCoordinator<T, S>
where
    T: Transport,
    S: PendingCommandStore,
{
    /// Create a coordinator publishing through `transport` and parking
    /// unacknowledged commands in `store`.
    pub fn new(transport: T, store: S, topics: TopicScheme, ack_timeout: Duration) -> Self {
        Self {
            transport,
            pending: PendingCommands::new(store),
            waiters: WaiterRegistry::new(),
            topics,
            ack_timeout,
        }
    }

    /// Default ack timeout used by [`RelayService::set_device_state`](crate::services::relay_service::RelayService::set_device_state).
    #[must_use]
    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    #[must_use]
    pub fn topics(&self) -> &TopicScheme {
        &self.topics
    }

    #[must_use]
    pub fn pending(&self) -> &PendingCommands<S> {
        &self.pending
    }

    #[must_use]
    pub fn waiters(&self) -> &WaiterRegistry {
        &self.waiters
    }

    /// Subscribe to every device's uplink and status topics.
    ///
    /// # Errors
    ///
    /// Returns a transport error if a subscription request fails.
    pub async fn subscribe_inbound(&self) -> Result<(), RelayError> {
        for kind in [TopicKind::Uplink, TopicKind::Status] {
            let filter = self.topics.wildcard(kind);
            self.transport.subscribe(&filter, QoS::AtLeastOnce).await?;
            tracing::info!(%filter, "subscribed");
        }
        Ok(())
    }

    /// Send `desired` to the device and wait up to `timeout` for its ack.
    ///
    /// Returns `Ok(true)` when the device acknowledged in time and
    /// `Ok(false)` when the command was stored as pending instead.
    ///
    /// # Errors
    ///
    /// Returns a persistence error when the pending command could not be
    /// stored; in that case the command is neither delivered nor queued.
    pub async fn send_and_await_ack(
        &self,
        device_id: &DeviceId,
        desired: DeviceState,
        timeout: Duration,
    ) -> Result<bool, RelayError> {
        let payload = SetStateCommand::new(device_id.clone(), desired).to_json();
        let topic = self.topics.downlink(device_id);

        let waiter = self.waiters.register(device_id, desired);

        match self
            .transport
            .publish(&topic, payload.as_bytes(), PublishOptions::downlink())
            .await
        {
            Ok(()) => {
                tracing::info!(%device_id, state = %desired, %topic, "sent state command");
                if waiter.wait(timeout).await {
                    tracing::info!(%device_id, state = %desired, "received acknowledgment");
                    self.drop_superseded(device_id).await;
                    return Ok(true);
                }
                tracing::warn!(
                    %device_id,
                    state = %desired,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "no acknowledgment before deadline"
                );
            }
            Err(err) => {
                drop(waiter);
                tracing::error!(%device_id, state = %desired, error = %err, "failed to send state command");
            }
        }

        self.pending
            .save(PendingCommand::new(device_id.clone(), payload))
            .await?;
        Ok(false)
    }

    /// Clear whatever an earlier timeout left pending for the device.
    async fn drop_superseded(&self, device_id: &DeviceId) {
        match self.pending.clear(device_id).await {
            Ok(0) => {}
            Ok(_) => tracing::info!(%device_id, "dropped superseded pending command"),
            Err(err) => {
                tracing::error!(%device_id, error = %err, "failed to drop superseded pending command");
            }
        }
    }

    /// Dispatch an inbound ack. Returns how many waiters it resolved.
    pub fn on_acknowledgment(&self, device_id: &DeviceId, state: DeviceState) -> usize {
        let resolved = self.waiters.resolve(device_id, state);
        if resolved == 0 {
            tracing::debug!(%device_id, %state, "dropping unmatched acknowledgment");
        }
        resolved
    }

    /// Republish the device's pending command, if any.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the pending slot could not be read or
    /// cleared. A failed publish is not an error: the outcome is
    /// [`ReplayOutcome::Retained`].
    pub async fn on_device_online(&self, device_id: &DeviceId) -> Result<ReplayOutcome, RelayError> {
        let slot = self.pending.slot(device_id).await;
        let Some(command) = slot.latest().await? else {
            return Ok(ReplayOutcome::NothingPending);
        };

        let topic = self.topics.downlink(device_id);
        if let Err(err) = self
            .transport
            .publish(&topic, command.payload.as_bytes(), PublishOptions::downlink())
            .await
        {
            tracing::error!(%device_id, error = %err, "failed to replay pending command");
            return Ok(ReplayOutcome::Retained);
        }

        slot.clear().await?;
        tracing::info!(%device_id, %topic, "replayed pending command");
        Ok(ReplayOutcome::Delivered)
    }

    /// Answer a device greeting with the server hello.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the publish fails.
    pub async fn send_server_hello(&self, device_id: &DeviceId) -> Result<(), RelayError> {
        let topic = self.topics.downlink(device_id);
        let payload = message::server_hello(device_id);
        self.transport
            .publish(&topic, payload.as_bytes(), PublishOptions::downlink())
            .await?;
        tracing::info!(%device_id, %topic, "sent hello");
        Ok(())
    }
}
