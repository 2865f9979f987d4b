//! MQTT connection configuration.

use std::time::Duration;

use rumqttc::{LastWill, MqttOptions};
use serde::Deserialize;

use crate::error::MqttError;

/// Configuration for the MQTT transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client identifier.
    pub client_id: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// How long to wait for the broker's `ConnAck` on startup, in seconds.
    pub connect_timeout_secs: u16,
    /// Pause between reconnection attempts, in seconds.
    pub reconnect_delay_secs: u16,
    /// Capacity of the client request queue and of the inbound event channel.
    pub channel_capacity: usize,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Message the broker publishes on our behalf if we vanish.
    pub last_will: Option<LastWillConfig>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "relayhub".to_string(),
            keep_alive_secs: 30,
            connect_timeout_secs: 10,
            reconnect_delay_secs: 5,
            channel_capacity: 64,
            username: None,
            password: None,
            last_will: None,
        }
    }
}

/// `[mqtt.last_will]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LastWillConfig {
    pub topic: String,
    pub payload: String,
    #[serde(default)]
    pub qos: u8,
    #[serde(default)]
    pub retain: bool,
}

impl MqttConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.connect_timeout_secs))
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.reconnect_delay_secs))
    }

    /// Build the rumqttc options for this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::InvalidQos`] when the last-will QoS is not 0, 1
    /// or 2.
    pub fn mqtt_options(&self) -> Result<MqttOptions, MqttError> {
        let mut options = MqttOptions::new(&self.client_id, &self.broker_host, self.broker_port);
        options.set_keep_alive(Duration::from_secs(u64::from(self.keep_alive_secs)));
        options.set_clean_session(true);
        options.set_request_channel_capacity(self.channel_capacity.max(1));

        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.clone().unwrap_or_default());
        }
        if let Some(will) = &self.last_will {
            options.set_last_will(LastWill::new(
                &will.topic,
                will.payload.as_bytes().to_vec(),
                qos(will.qos)?,
                will.retain,
            ));
        }
        Ok(options)
    }
}

pub(crate) fn qos(level: u8) -> Result<rumqttc::QoS, MqttError> {
    match level {
        0 => Ok(rumqttc::QoS::AtMostOnce),
        1 => Ok(rumqttc::QoS::AtLeastOnce),
        2 => Ok(rumqttc::QoS::ExactlyOnce),
        other => Err(MqttError::InvalidQos(other)),
    }
}
