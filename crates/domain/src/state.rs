//! Relay state — the only two positions a relay can be in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Switching state of a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    On,
    #[default]
    Off,
}

impl DeviceState {
    /// Lowercase wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceState {
    type Err = ValidationError;

    /// Firmware builds disagree on casing, so parsing ignores it.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("on") {
            Ok(Self::On)
        } else if s.eq_ignore_ascii_case("off") {
            Ok(Self::Off)
        } else {
            Err(ValidationError::UnknownState(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_off() {
        assert_eq!(DeviceState::default(), DeviceState::Off);
    }

    #[test]
    fn should_display_lowercase_variant_name() {
        assert_eq!(DeviceState::On.to_string(), "on");
        assert_eq!(DeviceState::Off.to_string(), "off");
    }

    #[test]
    fn should_parse_regardless_of_case() {
        assert_eq!("ON".parse::<DeviceState>().unwrap(), DeviceState::On);
        assert_eq!("Off".parse::<DeviceState>().unwrap(), DeviceState::Off);
    }

    #[test]
    fn should_reject_unknown_state() {
        let err = "dim".parse::<DeviceState>().unwrap_err();
        assert_eq!(err, ValidationError::UnknownState("dim".to_string()));
    }

    #[test]
    fn should_serialize_lowercase() {
        let json = serde_json::to_string(&DeviceState::On).unwrap();
        assert_eq!(json, "\"on\"");
    }
}
