//! Transport port — the publish/subscribe client, seen from the core.
//!
//! Inbound traffic does not go through this trait: adapters hand a stream of
//! [`TransportEvent`]s to the [`Dispatcher`](crate::dispatcher::Dispatcher),
//! so transport I/O never runs on the core's execution context.

use std::future::Future;
use std::sync::Arc;

use relayhub_domain::error::RelayError;

/// Delivery guarantee requested from the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QoS {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Per-publish options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishOptions {
    pub qos: QoS,
    pub retain: bool,
}

impl PublishOptions {
    /// Options used for downlink commands and replies.
    #[must_use]
    pub fn downlink() -> Self {
        Self {
            qos: QoS::AtLeastOnce,
            retain: false,
        }
    }
}

/// Something that happened on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The broker accepted our session (initially and after each reconnect).
    Connected,
    /// A message arrived on a subscribed topic.
    Message { topic: String, payload: Vec<u8> },
    /// The connection dropped; the adapter keeps retrying.
    Disconnected { reason: String },
}

/// Outbound side of the publish/subscribe client.
pub trait Transport {
    /// Publish a payload.
    ///
    /// Must fail fast with [`RelayError::Transport`] while disconnected rather
    /// than buffering the message.
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        options: PublishOptions,
    ) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Subscribe to a topic filter (wildcards allowed).
    fn subscribe(
        &self,
        filter: &str,
        qos: QoS,
    ) -> impl Future<Output = Result<(), RelayError>> + Send;
}

impl<T: Transport + Send + Sync> Transport for Arc<T> {
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        options: PublishOptions,
    ) -> impl Future<Output = Result<(), RelayError>> + Send {
        (**self).publish(topic, payload, options)
    }

    fn subscribe(
        &self,
        filter: &str,
        qos: QoS,
    ) -> impl Future<Output = Result<(), RelayError>> + Send {
        (**self).subscribe(filter, qos)
    }
}
