//! Relay service — the public face of the relay core.
//!
//! Device CRUD plus `set_device_state`, which sends a command, waits for the
//! device's acknowledgment and only then records the new state.

use std::sync::Arc;
use std::time::Duration;

use relayhub_domain::device::Device;
use relayhub_domain::error::{ConflictError, NotFoundError, RelayError};
use relayhub_domain::id::DeviceId;
use relayhub_domain::state::DeviceState;
use relayhub_domain::time::{self, Timestamp};

use crate::coordinator::AckCoordinator;
use crate::link::{LinkMonitor, LinkStatus};
use crate::ports::{DeviceRepository, PendingCommandStore, Transport};

/// Result of a `set_device_state` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub device_id: DeviceId,
    /// Confirmed state when acknowledged, requested state otherwise.
    pub state: DeviceState,
    pub acknowledged: bool,
    /// Set only when the device acknowledged.
    pub state_updated_at: Option<Timestamp>,
}

/// Application service driving devices through the relay.
pub struct RelayService<R, T, S> {
    devices: R,
    coordinator: Arc<AckCoordinator<T, S>>,
    link: LinkMonitor,
}

impl<R, T, S> RelayService<R, T, S>
where
    R: DeviceRepository,
    T: Transport,
    S: PendingCommandStore,
{
    /// Create a new service. The coordinator and link monitor are shared
    /// with the inbound dispatcher.
    pub fn new(devices: R, coordinator: Arc<AckCoordinator<T, S>>, link: LinkMonitor) -> Self {
        Self {
            devices,
            coordinator,
            link,
        }
    }

    /// Register a new device.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Validation`] if invariants fail,
    /// [`RelayError::Conflict`] if the id or name is already taken, or a
    /// storage error from the repository.
    #[tracing::instrument(skip_all, fields(device_id = %device.id, device_name = %device.name))]
    pub async fn create_device(&self, device: Device) -> Result<Device, RelayError> {
        device.validate()?;
        if self.devices.get_by_id(&device.id).await?.is_some() {
            return Err(ConflictError {
                entity: "Device",
                field: "id",
                value: device.id.to_string(),
            }
            .into());
        }
        if self.devices.find_by_name(&device.name).await?.is_some() {
            return Err(ConflictError {
                entity: "Device",
                field: "name",
                value: device.name,
            }
            .into());
        }
        let device = self.devices.create(device).await?;
        tracing::info!("device registered");
        Ok(device)
    }

    /// Look up a device by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NotFound`] when no device with `id` exists,
    /// or a storage error from the repository.
    #[tracing::instrument(skip_all, fields(device_id = %id))]
    pub async fn get_device(&self, id: &DeviceId) -> Result<Device, RelayError> {
        self.devices
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// List all devices.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_devices(&self) -> Result<Vec<Device>, RelayError> {
        self.devices.get_all().await
    }

    /// Delete a device together with its pending command.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NotFound`] when no device with `id` exists,
    /// or a storage error.
    #[tracing::instrument(skip_all, fields(device_id = %id))]
    pub async fn delete_device(&self, id: &DeviceId) -> Result<(), RelayError> {
        self.coordinator.pending().clear(id).await?;
        if !self.devices.delete(id).await? {
            return Err(not_found(id));
        }
        tracing::info!("device deleted");
        Ok(())
    }

    /// Ask a device to switch state, waiting for the default ack timeout.
    ///
    /// # Errors
    ///
    /// See [`Self::set_device_state_within`].
    pub async fn set_device_state(
        &self,
        id: &DeviceId,
        state: DeviceState,
    ) -> Result<StateChange, RelayError> {
        self.set_device_state_within(id, state, self.coordinator.ack_timeout())
            .await
    }

    /// Ask a device to switch state, waiting at most `timeout` for its ack.
    ///
    /// The stored state changes only when the device acknowledged. An
    /// unacknowledged command is kept for replay and reported with
    /// `acknowledged: false`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NotFound`] for unknown devices, or a storage
    /// error when the confirmed state or the pending command could not be
    /// written.
    #[tracing::instrument(skip_all, fields(device_id = %id, state = %state))]
    pub async fn set_device_state_within(
        &self,
        id: &DeviceId,
        state: DeviceState,
        timeout: Duration,
    ) -> Result<StateChange, RelayError> {
        self.get_device(id).await?;

        if !self
            .coordinator
            .send_and_await_ack(id, state, timeout)
            .await?
        {
            return Ok(StateChange {
                device_id: id.clone(),
                state,
                acknowledged: false,
                state_updated_at: None,
            });
        }

        let device = self
            .devices
            .confirm_state(id, state, time::now())
            .await?
            .ok_or_else(|| not_found(id))?;
        tracing::info!("state confirmed");

        Ok(StateChange {
            device_id: device.id,
            state: device.state,
            acknowledged: true,
            state_updated_at: Some(device.state_updated_at),
        })
    }

    /// Whether the server is currently connected to the broker.
    #[must_use]
    pub fn link_status(&self) -> LinkStatus {
        self.link.status()
    }
}

fn not_found(id: &DeviceId) -> RelayError {
    NotFoundError {
        entity: "Device",
        id: id.to_string(),
    }
    .into()
}
