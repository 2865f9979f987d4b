//! Pending-command service — serialised access to the per-device slot.
//!
//! The store port is atomic per call, but replay is a sequence
//! (read → republish → clear). Without a per-device lock a timeout could save
//! a fresh command between the read and the clear, and the clear would wipe
//! it. [`PendingCommands::slot`] hands out an exclusive view of one device's
//! slot for the duration of such a sequence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

use relayhub_domain::error::RelayError;
use relayhub_domain::id::DeviceId;
use relayhub_domain::pending::PendingCommand;

use crate::ports::PendingCommandStore;

/// One async mutex per device, created on first use and dropped once nobody
/// holds or waits for it.
#[derive(Default)]
struct DeviceLocks {
    locks: Mutex<HashMap<DeviceId, Arc<tokio::sync::Mutex<()>>>>,
}

impl DeviceLocks {
    async fn lock(&self, device_id: &DeviceId) -> DeviceLock<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(device_id.clone()).or_default())
        };
        DeviceLock {
            locks: self,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Forget every lock only the map still references. Runs under the map
    /// mutex, so no caller can be between lookup and acquisition.
    fn sweep(&self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Held per-device lock; releases and sweeps on drop.
struct DeviceLock<'a> {
    locks: &'a DeviceLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DeviceLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.sweep();
    }
}

/// Application service wrapping a [`PendingCommandStore`] with per-device
/// mutual exclusion. Different devices never wait on each other.
pub struct PendingCommands<S> {
    store: S,
    locks: DeviceLocks,
}

impl<S: PendingCommandStore> PendingCommands<S> {
    /// Create a new service backed by the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: DeviceLocks::default(),
        }
    }

    /// Exclusive access to one device's slot until the returned value is
    /// dropped.
    pub async fn slot<'a>(&'a self, device_id: &DeviceId) -> PendingSlot<'a, S> {
        let guard = self.locks.lock(device_id).await;
        PendingSlot {
            store: &self.store,
            device_id: device_id.clone(),
            _guard: guard,
        }
    }

    /// Replace the device's pending command.
    ///
    /// # Errors
    ///
    /// Returns a persistence error from the store; the caller must surface
    /// it since the command is otherwise lost.
    pub async fn save(&self, command: PendingCommand) -> Result<(), RelayError> {
        let device_id = command.device_id.clone();
        self.slot(&device_id).await.replace(command).await
    }

    /// Read the device's pending command, if any.
    ///
    /// # Errors
    ///
    /// Returns a persistence error from the store.
    pub async fn latest(&self, device_id: &DeviceId) -> Result<Option<PendingCommand>, RelayError> {
        self.slot(device_id).await.latest().await
    }

    /// Drop the device's pending command.
    ///
    /// # Errors
    ///
    /// Returns a persistence error from the store.
    pub async fn clear(&self, device_id: &DeviceId) -> Result<u64, RelayError> {
        self.slot(device_id).await.clear().await
    }
}

/// Exclusive view of one device's pending slot.
pub struct PendingSlot<'a, S> {
    store: &'a S,
    device_id: DeviceId,
    _guard: DeviceLock<'a>,
}

impl<S: PendingCommandStore> PendingSlot<'_, S> {
    /// Save `command`, replacing anything already pending.
    ///
    /// # Errors
    ///
    /// Returns a persistence error from the store.
    pub async fn replace(&self, command: PendingCommand) -> Result<(), RelayError> {
        debug_assert_eq!(command.device_id, self.device_id);
        self.store.save_pending(&command).await?;
        tracing::info!(device_id = %self.device_id, "stored pending command");
        Ok(())
    }

    /// Read the pending command without removing it.
    ///
    /// # Errors
    ///
    /// Returns a persistence error from the store.
    pub async fn latest(&self) -> Result<Option<PendingCommand>, RelayError> {
        self.store.take_latest_pending(&self.device_id).await
    }

    /// Remove the pending command.
    ///
    /// # Errors
    ///
    /// Returns a persistence error from the store.
    pub async fn clear(&self) -> Result<u64, RelayError> {
        self.store.clear_pending(&self.device_id).await
    }
}
