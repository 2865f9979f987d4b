//! Presence tracker — best-effort online/offline bookkeeping.

use relayhub_domain::id::DeviceId;

use crate::ports::DeviceRepository;

/// Keeps each device's `online` flag in step with presence events and
/// uplink traffic.
///
/// Presence is best-effort: persistence failures are logged and swallowed so
/// they never hold up message relay.
pub struct PresenceTracker<R> {
    repo: R,
}

impl<R: DeviceRepository> PresenceTracker<R> {
    /// Create a new tracker backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Mark a device online. Returns the previous flag, or `None` if the
    /// device is unknown or the update failed.
    pub async fn mark_online(&self, device_id: &DeviceId) -> Option<bool> {
        self.set(device_id, true).await
    }

    /// Mark a device offline. Returns the previous flag, or `None` if the
    /// device is unknown or the update failed.
    pub async fn mark_offline(&self, device_id: &DeviceId) -> Option<bool> {
        self.set(device_id, false).await
    }

    async fn set(&self, device_id: &DeviceId, online: bool) -> Option<bool> {
        match self.repo.set_online(device_id, online).await {
            Ok(Some(previous)) => {
                if previous == online {
                    tracing::trace!(%device_id, online, "presence unchanged");
                } else {
                    tracing::info!(%device_id, online, "device presence changed");
                }
                Some(previous)
            }
            Ok(None) => {
                tracing::debug!(%device_id, online, "presence for unknown device ignored");
                None
            }
            Err(err) => {
                tracing::warn!(%device_id, online, error = %err, "failed to persist presence");
                None
            }
        }
    }
}
