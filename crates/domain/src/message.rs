//! Wire messages exchanged with relay devices.
//!
//! | Direction | Shape |
//! |-----------|-------|
//! | uplink hello | `{device_uuid, message:"hello", device_name, state, timestamp}` |
//! | uplink ack | `{device_uuid, command:"ack", state, timestamp}` |
//! | downlink command | `{device_id, command:"set_state", state, timestamp}` |
//! | downlink hello | `{device_id, message:"hello from server"}` |
//! | presence | `{device_uuid, status:"online"\|"offline", timestamp}` |

use serde::{Deserialize, Serialize};

use crate::error::MalformedPayload;
use crate::id::DeviceId;
use crate::state::DeviceState;
use crate::time::{self, Timestamp};

/// `command` value of a state-change downlink.
pub const SET_STATE_COMMAND: &str = "set_state";
/// `command` value of a device acknowledgment.
pub const ACK_COMMAND: &str = "ack";
/// `message` value of the server's greeting reply.
pub const SERVER_HELLO: &str = "hello from server";

const GREETINGS: [&str; 2] = ["hello", "greetings"];

/// Downlink asking a device to switch its relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetStateCommand {
    pub device_id: DeviceId,
    pub state: DeviceState,
    pub timestamp: Timestamp,
}

impl SetStateCommand {
    /// Build a command stamped with the current time.
    #[must_use]
    pub fn new(device_id: DeviceId, state: DeviceState) -> Self {
        Self {
            device_id,
            state,
            timestamp: time::now(),
        }
    }

    /// Serialize to the JSON text published on the downlink topic.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "device_id": self.device_id,
            "command": SET_STATE_COMMAND,
            "state": self.state,
            "timestamp": time::to_wire(self.timestamp),
        })
        .to_string()
    }
}

/// Server reply to a device greeting.
#[must_use]
pub fn server_hello(device_id: &DeviceId) -> String {
    serde_json::json!({
        "device_id": device_id,
        "message": SERVER_HELLO,
    })
    .to_string()
}

/// Any message a device publishes on its uplink topic.
///
/// Every field is optional: hellos, acks and free-form telemetry share the
/// topic, and firmware builds add extra fields (`original_command`, …).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UplinkMessage {
    pub device_uuid: Option<String>,
    pub message: Option<String>,
    pub command: Option<String>,
    pub state: Option<String>,
    pub device_name: Option<String>,
    /// Set by firmware on acks; `false` means the command was not applied.
    pub success: Option<bool>,
    /// Firmware sends either an ISO string or `millis()` since boot.
    pub timestamp: Option<serde_json::Value>,
}

impl UplinkMessage {
    /// Decode an uplink payload.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedPayload::Json`] when the bytes are not a JSON
    /// object of the expected shape.
    pub fn decode(payload: &[u8]) -> Result<Self, MalformedPayload> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Whether this is a device announcing itself (`hello` / `greetings`).
    #[must_use]
    pub fn is_greeting(&self) -> bool {
        self.message.as_deref().is_some_and(|msg| {
            let msg = msg.trim();
            GREETINGS.iter().any(|g| msg.eq_ignore_ascii_case(g))
        })
    }

    /// The state confirmed by this message, if it is a successful ack.
    #[must_use]
    pub fn acknowledged_state(&self) -> Option<DeviceState> {
        if self.command.as_deref() != Some(ACK_COMMAND) || self.success == Some(false) {
            return None;
        }
        self.state.as_deref()?.parse().ok()
    }
}

/// Presence status carried on the status topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Presence announcement, also a device's last-will payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PresenceMessage {
    pub device_uuid: Option<String>,
    pub status: PresenceStatus,
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
}

impl PresenceMessage {
    /// Decode a status-topic payload.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedPayload::Json`] when the payload is not a presence
    /// object with a known `status`.
    pub fn decode(payload: &[u8]) -> Result<Self, MalformedPayload> {
        Ok(serde_json::from_slice(payload)?)
    }
}
