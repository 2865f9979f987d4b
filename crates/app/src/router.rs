//! Topic router — classifies inbound transport messages.
//!
//! Routing is pure: it decodes and classifies, it never touches storage or
//! the transport. Anything it cannot make sense of is logged and dropped.

use relayhub_domain::error::MalformedPayload;
use relayhub_domain::id::DeviceId;
use relayhub_domain::message::{PresenceMessage, PresenceStatus, UplinkMessage};
use relayhub_domain::state::DeviceState;
use relayhub_domain::topic::{ParsedTopic, TopicKind, TopicScheme};

/// What an inbound message means for the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutedEvent {
    /// Presence change, from the status topic or implied by uplink traffic.
    Presence { device_id: DeviceId, online: bool },
    /// Any uplink message. Undecodable payloads arrive with an empty body.
    Uplink {
        device_id: DeviceId,
        message: UplinkMessage,
    },
    /// The device confirmed it switched to `state`.
    Acknowledgment {
        device_id: DeviceId,
        state: DeviceState,
    },
    /// The device greeted us and is ready for replays.
    DeviceOnline { device_id: DeviceId },
}

/// Stateless classifier over a [`TopicScheme`].
#[derive(Debug, Clone, Default)]
pub struct TopicRouter {
    topics: TopicScheme,
}

impl TopicRouter {
    #[must_use]
    pub fn new(topics: TopicScheme) -> Self {
        Self { topics }
    }

    /// Classify one inbound message. Returns an empty list for anything that
    /// should be ignored.
    #[must_use]
    pub fn route(&self, topic: &str, payload: &[u8]) -> Vec<RoutedEvent> {
        let ParsedTopic { kind, device_id } = match self.topics.parse(topic) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(%topic, error = %err, "dropping message on malformed topic");
                return Vec::new();
            }
        };

        match kind {
            TopicKind::Status => route_status(device_id, payload),
            TopicKind::Uplink => route_uplink(device_id, payload),
            TopicKind::Downlink => {
                tracing::trace!(%device_id, "ignoring downlink echo");
                Vec::new()
            }
        }
    }
}

fn route_status(device_id: DeviceId, payload: &[u8]) -> Vec<RoutedEvent> {
    let presence = match PresenceMessage::decode(payload) {
        Ok(presence) => presence,
        Err(err) => {
            tracing::warn!(%device_id, error = %err, "dropping undecodable status payload");
            return Vec::new();
        }
    };
    if let Err(err) = check_device(&device_id, presence.device_uuid.as_deref()) {
        tracing::warn!(error = %err, "dropping status payload");
        return Vec::new();
    }

    let online = presence.status == PresenceStatus::Online;
    vec![RoutedEvent::Presence { device_id, online }]
}

fn route_uplink(device_id: DeviceId, payload: &[u8]) -> Vec<RoutedEvent> {
    let message = match UplinkMessage::decode(payload) {
        Ok(message) => message,
        Err(err) => {
            tracing::warn!(%device_id, error = %err, "uplink payload is not JSON");
            return vec![
                RoutedEvent::Presence {
                    device_id: device_id.clone(),
                    online: true,
                },
                RoutedEvent::Uplink {
                    device_id,
                    message: UplinkMessage::default(),
                },
            ];
        }
    };

    let mut events = vec![RoutedEvent::Presence {
        device_id: device_id.clone(),
        online: true,
    }];

    if let Some(state) = message.acknowledged_state() {
        match check_device(&device_id, message.device_uuid.as_deref()) {
            Ok(()) => events.push(RoutedEvent::Acknowledgment {
                device_id: device_id.clone(),
                state,
            }),
            Err(err) => tracing::warn!(error = %err, "dropping acknowledgment"),
        }
    }

    let greeting = message.is_greeting();
    events.push(RoutedEvent::Uplink {
        device_id: device_id.clone(),
        message,
    });
    if greeting {
        events.push(RoutedEvent::DeviceOnline { device_id });
    }
    events
}

fn check_device(topic_device: &DeviceId, payload_device: Option<&str>) -> Result<(), MalformedPayload> {
    match payload_device {
        Some(payload) if payload != topic_device.as_str() => Err(MalformedPayload::DeviceMismatch {
            topic: topic_device.to_string(),
            payload: payload.to_string(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::device_id;

    fn router() -> TopicRouter {
        TopicRouter::default()
    }

    #[test]
    fn should_route_ack_with_presence_and_uplink() {
        let events = router().route(
            "ControlDevice/Uplink/AABBCCDDEEF1",
            br#"{"device_uuid":"AABBCCDDEEF1","command":"ack","state":"on","timestamp":1234}"#,
        );

        let id = device_id("AABBCCDDEEF1");
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            RoutedEvent::Presence {
                device_id: id.clone(),
                online: true
            }
        );
        assert_eq!(
            events[1],
            RoutedEvent::Acknowledgment {
                device_id: id,
                state: DeviceState::On
            }
        );
        assert!(matches!(events[2], RoutedEvent::Uplink { .. }));
    }

    #[test]
    fn should_route_greeting_as_device_online() {
        let events = router().route(
            "ControlDevice/Uplink/AABBCCDDEEF1",
            br#"{"device_uuid":"AABBCCDDEEF1","message":"Hello","device_name":"Garage","state":"off"}"#,
        );

        assert_eq!(
            events.last(),
            Some(&RoutedEvent::DeviceOnline {
                device_id: device_id("AABBCCDDEEF1")
            })
        );
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, RoutedEvent::Acknowledgment { .. }))
        );
    }

    #[test]
    fn should_not_treat_failed_ack_as_acknowledgment() {
        let events = router().route(
            "ControlDevice/Uplink/AABBCCDDEEF1",
            br#"{"command":"ack","state":"on","success":false}"#,
        );
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, RoutedEvent::Acknowledgment { .. }))
        );
    }

    #[test]
    fn should_drop_ack_for_mismatched_device() {
        let events = router().route(
            "ControlDevice/Uplink/AABBCCDDEEF1",
            br#"{"device_uuid":"AABBCCDDEEF2","command":"ack","state":"on"}"#,
        );
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, RoutedEvent::Acknowledgment { .. }))
        );
    }

    #[test]
    fn should_emit_empty_uplink_for_non_json_payload() {
        let events = router().route("ControlDevice/Uplink/AABBCCDDEEF1", b"not json");
        assert_eq!(
            events[1],
            RoutedEvent::Uplink {
                device_id: device_id("AABBCCDDEEF1"),
                message: UplinkMessage::default(),
            }
        );
    }

    #[test]
    fn should_route_offline_status() {
        let events = router().route(
            "ControlDevice/Status/AABBCCDDEEF1",
            br#"{"device_uuid":"AABBCCDDEEF1","status":"offline"}"#,
        );
        assert_eq!(
            events,
            vec![RoutedEvent::Presence {
                device_id: device_id("AABBCCDDEEF1"),
                online: false
            }]
        );
    }

    #[test]
    fn should_route_online_status() {
        let events = router().route("ControlDevice/Status/AABBCCDDEEF1", br#"{"status":"online"}"#);
        assert_eq!(
            events,
            vec![RoutedEvent::Presence {
                device_id: device_id("AABBCCDDEEF1"),
                online: true
            }]
        );
    }

    #[test]
    fn should_drop_undecodable_status() {
        assert!(
            router()
                .route("ControlDevice/Status/AABBCCDDEEF1", br#"{"status":"sleeping"}"#)
                .is_empty()
        );
    }

    #[test]
    fn should_drop_malformed_topics() {
        for topic in [
            "ControlDevice/Uplink",
            "ControlDevice",
            "ControlDevice/Uplink/AABBCCDDEEF1/extra",
            "Other/Uplink/AABBCCDDEEF1",
            "ControlDevice/Sideways/AABBCCDDEEF1",
        ] {
            assert!(
                router().route(topic, br#"{"message":"hello"}"#).is_empty(),
                "{topic} should be dropped"
            );
        }
    }

    #[test]
    fn should_ignore_downlink_echoes() {
        assert!(
            router()
                .route(
                    "ControlDevice/Downlink/AABBCCDDEEF1",
                    br#"{"command":"set_state","state":"on"}"#
                )
                .is_empty()
        );
    }

    #[test]
    fn should_use_custom_root() {
        let router = TopicRouter::new(TopicScheme::new("Relays"));
        assert_eq!(
            router
                .route("Relays/Status/AABBCCDDEEF1", br#"{"status":"offline"}"#)
                .len(),
            1
        );
        assert!(
            router
                .route("ControlDevice/Status/AABBCCDDEEF1", br#"{"status":"offline"}"#)
                .is_empty()
        );
    }
}
