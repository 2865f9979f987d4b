//! Device identifier newtype.
//!
//! Relay devices identify themselves with an opaque string (usually the
//! radio's MAC address without separators, e.g. `AABBCCDDEEF1`). The value
//! is embedded as one segment of every topic, so it must not contain the
//! topic separator or MQTT wildcards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Characters that would break the `{root}/{kind}/{device_id}` topic shape.
const RESERVED: [char; 3] = ['/', '+', '#'];

/// Globally unique identifier of a relay device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Validate and wrap a raw identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyDeviceId`] for an empty string and
    /// [`ValidationError::InvalidDeviceId`] when a reserved topic character
    /// is present.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::EmptyDeviceId);
        }
        if value.contains(RESERVED) {
            return Err(ValidationError::InvalidDeviceId(value));
        }
        Ok(Self(value))
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_accept_mac_like_identifier() {
        let id = DeviceId::new("AABBCCDDEEF1").unwrap();
        assert_eq!(id.as_str(), "AABBCCDDEEF1");
    }

    #[test]
    fn should_reject_empty_identifier() {
        assert_eq!(DeviceId::new(""), Err(ValidationError::EmptyDeviceId));
    }

    #[test]
    fn should_reject_topic_separator_and_wildcards() {
        for raw in ["a/b", "dev+", "#"] {
            assert!(matches!(
                DeviceId::new(raw),
                Err(ValidationError::InvalidDeviceId(_))
            ));
        }
    }

    #[test]
    fn should_roundtrip_through_display_and_from_str() {
        let id = DeviceId::new("relay-01").unwrap();
        let parsed: DeviceId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_serialize_as_plain_string() {
        let id = DeviceId::new("AABBCCDDEEF1").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"AABBCCDDEEF1\"");
    }

    #[test]
    fn should_refuse_to_deserialize_invalid_identifier() {
        let result = serde_json::from_str::<DeviceId>("\"a/b\"");
        assert!(result.is_err());
    }
}
