//! rumqttc-backed [`Transport`] and its event-loop task.
//!
//! The rumqttc `EventLoop` must be polled continuously to make progress. It
//! runs on its own task and forwards everything the core cares about as
//! [`TransportEvent`]s through a bounded channel, so the core never runs on
//! the network task. Outbound requests never wait on that task: they are
//! queued with `try_*` and fail when the queue is full.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, Outgoing};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use relayhub_app::ports::{PublishOptions, QoS, Transport, TransportEvent};
use relayhub_domain::error::RelayError;

use crate::config::MqttConfig;
use crate::error::MqttError;

/// Inbound side of the transport, handed out once by [`connect`].
pub type InboundStream = ReceiverStream<TransportEvent>;

/// Connect to the broker and start the event-loop task.
///
/// Returns once the broker acknowledged the session. The first item of the
/// returned stream is always [`TransportEvent::Connected`].
///
/// # Errors
///
/// Returns [`MqttError::Connection`] when the broker refuses or cannot be
/// reached, and [`MqttError::ConnectTimeout`] when no `ConnAck` arrives in
/// time.
pub async fn connect(config: &MqttConfig) -> Result<(MqttTransport, InboundStream), MqttError> {
    let options = config.mqtt_options()?;
    let capacity = config.channel_capacity.max(1);
    let (client, mut eventloop) = AsyncClient::new(options, capacity);

    tracing::info!(
        host = %config.broker_host,
        port = config.broker_port,
        client_id = %config.client_id,
        "connecting to broker"
    );
    let timeout = config.connect_timeout();
    tokio::time::timeout(timeout, wait_for_connack(&mut eventloop))
        .await
        .map_err(|_| MqttError::ConnectTimeout(timeout))??;
    tracing::info!("connected to broker");

    let (events, inbound) = mpsc::channel(capacity);
    events
        .try_send(TransportEvent::Connected)
        .map_err(|_| MqttError::NotConnected)?;

    let connected = Arc::new(AtomicBool::new(true));
    let shutdown = Arc::new(Notify::new());
    let task = tokio::spawn(run_event_loop(
        eventloop,
        events,
        Arc::clone(&connected),
        Arc::clone(&shutdown),
        config.reconnect_delay(),
    ));

    let transport = MqttTransport {
        client,
        connected,
        shutdown,
        task: Mutex::new(Some(task)),
    };
    Ok((transport, ReceiverStream::new(inbound)))
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), MqttError> {
    loop {
        match eventloop.poll().await.map_err(MqttError::Connection)? {
            Event::Incoming(Incoming::ConnAck(_)) => return Ok(()),
            other => tracing::trace!(event = ?other, "waiting for ConnAck"),
        }
    }
}

/// What a polled event means for the core, if anything.
fn translate(event: &Event) -> Option<TransportEvent> {
    match event {
        Event::Incoming(Incoming::ConnAck(_)) => Some(TransportEvent::Connected),
        Event::Incoming(Incoming::Publish(publish)) => Some(TransportEvent::Message {
            topic: publish.topic.clone(),
            payload: publish.payload.to_vec(),
        }),
        _ => None,
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    events: mpsc::Sender<TransportEvent>,
    connected: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    reconnect_delay: Duration,
) {
    loop {
        let polled = tokio::select! {
            () = shutdown.notified() => break,
            () = events.closed() => break,
            polled = eventloop.poll() => polled,
        };

        match polled {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                connected.store(false, Ordering::SeqCst);
                tracing::debug!("disconnect sent");
                break;
            }
            Ok(event) => {
                let Some(translated) = translate(&event) else {
                    continue;
                };
                if translated == TransportEvent::Connected
                    && connected.swap(true, Ordering::SeqCst)
                {
                    continue;
                }
                if translated == TransportEvent::Connected {
                    tracing::info!("reconnected to broker");
                }
                if events.send(translated).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                if connected.swap(false, Ordering::SeqCst) {
                    tracing::warn!(error = %err, "lost connection to broker");
                    let event = TransportEvent::Disconnected {
                        reason: err.to_string(),
                    };
                    if events.send(event).await.is_err() {
                        break;
                    }
                } else {
                    tracing::debug!(error = %err, "reconnection attempt failed");
                }
                tokio::select! {
                    () = shutdown.notified() => break,
                    () = tokio::time::sleep(reconnect_delay) => {}
                }
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
    tracing::info!("mqtt event loop stopped");
}

fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

/// Outbound handle on the broker connection.
pub struct MqttTransport {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttTransport {
    /// Whether the broker link is currently up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Disconnect cleanly and stop the event-loop task, waiting at most
    /// `grace` for the broker to see the disconnect.
    pub async fn shutdown(&self, grace: Duration) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut task) = task else {
            return;
        };

        if self.is_connected() {
            if let Err(err) = self.client.try_disconnect() {
                tracing::debug!(error = %err, "could not queue disconnect");
                self.shutdown.notify_one();
            }
        } else {
            self.shutdown.notify_one();
        }

        if tokio::time::timeout(grace, &mut task).await.is_err() {
            tracing::warn!("mqtt event loop did not stop in time");
            task.abort();
        }
    }
}

impl Transport for MqttTransport {
    /// Queues the publish without waiting. A full request queue is reported
    /// as a transport error, the same as a dropped link.
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        options: PublishOptions,
    ) -> impl Future<Output = Result<(), RelayError>> + Send {
        let queued = if self.is_connected() {
            self.client
                .try_publish(
                    topic,
                    to_mqtt_qos(options.qos),
                    options.retain,
                    payload.to_vec(),
                )
                .map_err(MqttError::Client)
        } else {
            Err(MqttError::NotConnected)
        };
        async move { queued.map_err(RelayError::from) }
    }

    fn subscribe(
        &self,
        filter: &str,
        qos: QoS,
    ) -> impl Future<Output = Result<(), RelayError>> + Send {
        let queued = self
            .client
            .try_subscribe(filter, to_mqtt_qos(qos))
            .map_err(MqttError::Client);
        async move { queued.map_err(RelayError::from) }
    }
}
