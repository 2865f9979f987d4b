//! Device — a remote relay reachable over the pub/sub transport.

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, ValidationError};
use crate::id::DeviceId;
use crate::state::DeviceState;
use crate::time::{self, Timestamp};

/// A registered relay device.
///
/// `state` only ever holds a device-acknowledged value; requested but
/// unconfirmed transitions live in the pending store instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub state: DeviceState,
    pub online: bool,
    pub attached_system_id: Option<String>,
    pub created_at: Timestamp,
    pub state_updated_at: Timestamp,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Validation`] when `name` is empty.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }

    /// Record a state the device has acknowledged.
    pub fn confirm_state(&mut self, state: DeviceState, at: Timestamp) {
        self.state = state;
        self.state_updated_at = at;
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<String>,
    name: Option<String>,
    state: Option<DeviceState>,
    online: bool,
    attached_system_id: Option<String>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn state(mut self, state: DeviceState) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    #[must_use]
    pub fn attached_system_id(mut self, id: impl Into<String>) -> Self {
        self.attached_system_id = Some(id.into());
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Validation`] if the id is missing or not
    /// topic-safe, or if the name is missing or empty.
    pub fn build(self) -> Result<Device, RelayError> {
        let id = DeviceId::new(self.id.unwrap_or_default())?;
        let now = time::now();
        let device = Device {
            id,
            name: self.name.unwrap_or_default(),
            state: self.state.unwrap_or_default(),
            online: self.online,
            attached_system_id: self.attached_system_id,
            created_at: now,
            state_updated_at: now,
        };
        device.validate()?;
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_offline_device_in_off_state_by_default() {
        let device = Device::builder()
            .id("AABBCCDDEEF1")
            .name("Garage relay")
            .build()
            .unwrap();
        assert_eq!(device.id.as_str(), "AABBCCDDEEF1");
        assert_eq!(device.state, DeviceState::Off);
        assert!(!device.online);
        assert!(device.attached_system_id.is_none());
        assert_eq!(device.created_at, device.state_updated_at);
    }

    #[test]
    fn should_return_validation_error_when_name_is_empty() {
        let result = Device::builder().id("AABBCCDDEEF1").name("  ").build();
        assert!(matches!(
            result,
            Err(RelayError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_return_validation_error_when_id_is_missing() {
        let result = Device::builder().name("Garage relay").build();
        assert!(matches!(
            result,
            Err(RelayError::Validation(ValidationError::EmptyDeviceId))
        ));
    }

    #[test]
    fn should_update_state_and_timestamp_when_confirmed() {
        let mut device = Device::builder()
            .id("AABBCCDDEEF1")
            .name("Garage relay")
            .build()
            .unwrap();
        let at = device.created_at + chrono::Duration::seconds(3);

        device.confirm_state(DeviceState::On, at);

        assert_eq!(device.state, DeviceState::On);
        assert_eq!(device.state_updated_at, at);
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let device = Device::builder()
            .id("AABBCCDDEEF1")
            .name("Pump")
            .attached_system_id("irrigation")
            .build()
            .unwrap();
        let json = serde_json::to_string(&device).unwrap();
        let parsed: Device = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, device);
    }
}
