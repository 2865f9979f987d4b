//! Pending command — the latest command a device failed to acknowledge.

use serde::{Deserialize, Serialize};

use crate::id::DeviceId;
use crate::time::{self, Timestamp};

/// A command held for replay on the device's next greeting.
///
/// At most one exists per device; saving a new one replaces the previous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCommand {
    pub device_id: DeviceId,
    /// Serialized downlink payload, republished verbatim.
    pub payload: String,
    pub created_at: Timestamp,
}

impl PendingCommand {
    /// Create a pending command stamped with the current time.
    #[must_use]
    pub fn new(device_id: DeviceId, payload: impl Into<String>) -> Self {
        Self {
            device_id,
            payload: payload.into(),
            created_at: time::now(),
        }
    }
}
