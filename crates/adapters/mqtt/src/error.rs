//! MQTT adapter error types.

use std::time::Duration;

use relayhub_domain::error::RelayError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The broker link is down; nothing is queued.
    #[error("MQTT client not connected")]
    NotConnected,

    /// The rumqttc client returned an error.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// The connection to the broker failed.
    #[error("MQTT connection error")]
    Connection(#[source] rumqttc::ConnectionError),

    /// The broker did not acknowledge the connection in time.
    #[error("no ConnAck from broker within {0:?}")]
    ConnectTimeout(Duration),

    /// A configured QoS level is not 0, 1 or 2.
    #[error("invalid QoS level {0}")]
    InvalidQos(u8),
}

impl From<MqttError> for RelayError {
    fn from(err: MqttError) -> Self {
        Self::transport(err)
    }
}
