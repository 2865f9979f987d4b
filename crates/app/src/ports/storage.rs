//! Storage ports — device records and the pending-command slot.

use std::future::Future;
use std::sync::Arc;

use relayhub_domain::device::Device;
use relayhub_domain::error::RelayError;
use relayhub_domain::id::DeviceId;
use relayhub_domain::pending::PendingCommand;
use relayhub_domain::state::DeviceState;
use relayhub_domain::time::Timestamp;

/// Repository for [`Device`] records.
///
/// `set_online` and `confirm_state` must each be atomic for a given device.
pub trait DeviceRepository {
    /// Insert a new device.
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, RelayError>> + Send;

    /// Look up a device by id.
    fn get_by_id(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, RelayError>> + Send;

    /// Look up a device by display name.
    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Device>, RelayError>> + Send;

    /// List every device.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, RelayError>> + Send;

    /// Delete a device. Returns whether a record was removed.
    fn delete(&self, id: &DeviceId) -> impl Future<Output = Result<bool, RelayError>> + Send;

    /// Set the online flag and return its previous value, or `None` when the
    /// device is unknown.
    fn set_online(
        &self,
        id: &DeviceId,
        online: bool,
    ) -> impl Future<Output = Result<Option<bool>, RelayError>> + Send;

    /// Store a device-acknowledged state and its timestamp.
    ///
    /// Returns the updated device, or `None` when the device is unknown.
    fn confirm_state(
        &self,
        id: &DeviceId,
        state: DeviceState,
        at: Timestamp,
    ) -> impl Future<Output = Result<Option<Device>, RelayError>> + Send;
}

/// Durable single-slot-per-device store for undelivered commands.
pub trait PendingCommandStore {
    /// Replace whatever is pending for the command's device, in one
    /// transaction.
    fn save_pending(
        &self,
        command: &PendingCommand,
    ) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Read the pending command for a device without removing it.
    fn take_latest_pending(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<PendingCommand>, RelayError>> + Send;

    /// Remove every pending command for a device. Returns how many were removed.
    fn clear_pending(&self, id: &DeviceId) -> impl Future<Output = Result<u64, RelayError>> + Send;
}

impl<T: DeviceRepository + Send + Sync> DeviceRepository for Arc<T> {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, RelayError>> + Send {
        (**self).create(device)
    }

    fn get_by_id(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, RelayError>> + Send {
        (**self).get_by_id(id)
    }

    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Device>, RelayError>> + Send {
        (**self).find_by_name(name)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, RelayError>> + Send {
        (**self).get_all()
    }

    fn delete(&self, id: &DeviceId) -> impl Future<Output = Result<bool, RelayError>> + Send {
        (**self).delete(id)
    }

    fn set_online(
        &self,
        id: &DeviceId,
        online: bool,
    ) -> impl Future<Output = Result<Option<bool>, RelayError>> + Send {
        (**self).set_online(id, online)
    }

    fn confirm_state(
        &self,
        id: &DeviceId,
        state: DeviceState,
        at: Timestamp,
    ) -> impl Future<Output = Result<Option<Device>, RelayError>> + Send {
        (**self).confirm_state(id, state, at)
    }
}

impl<T: PendingCommandStore + Send + Sync> PendingCommandStore for Arc<T> {
    fn save_pending(
        &self,
        command: &PendingCommand,
    ) -> impl Future<Output = Result<(), RelayError>> + Send {
        (**self).save_pending(command)
    }

    fn take_latest_pending(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<PendingCommand>, RelayError>> + Send {
        (**self).take_latest_pending(id)
    }

    fn clear_pending(&self, id: &DeviceId) -> impl Future<Output = Result<u64, RelayError>> + Send {
        (**self).clear_pending(id)
    }
}
