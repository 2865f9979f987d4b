//! # relayhub-adapter-mqtt
//!
//! MQTT adapter — the relay's publish/subscribe transport.
//!
//! ## Responsibilities
//! - Connect to an MQTT broker (credentials and last will optional)
//! - Implement the `Transport` port for downlink publishes and subscriptions
//! - Run the rumqttc event loop on its own task and stream inbound messages
//!   and link changes to the core as `TransportEvent`s
//! - Refuse publishes while the link is down instead of queueing them
//!
//! ## Dependency rule
//! Same as other adapters: depends on `relayhub-app` and `relayhub-domain`.

mod config;
mod error;
mod transport;

pub use config::{LastWillConfig, MqttConfig};
pub use error::MqttError;
pub use transport::{InboundStream, MqttTransport, connect};
