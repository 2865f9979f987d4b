//! Topic scheme — `{root}/{kind}/{device_id}`.
//!
//! | Kind | Direction | Example |
//! |------|-----------|---------|
//! | `Uplink` | device → server | `ControlDevice/Uplink/AABBCCDDEEF1` |
//! | `Downlink` | server → device | `ControlDevice/Downlink/AABBCCDDEEF1` |
//! | `Status` | presence / last will | `ControlDevice/Status/AABBCCDDEEF1` |

use crate::error::MalformedPayload;
use crate::id::DeviceId;

/// Default topic root used by the relay firmware.
pub const DEFAULT_ROOT: &str = "ControlDevice";

/// Second segment of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Uplink,
    Downlink,
    Status,
}

impl TopicKind {
    fn segment(self) -> &'static str {
        match self {
            Self::Uplink => "Uplink",
            Self::Downlink => "Downlink",
            Self::Status => "Status",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "Uplink" => Some(Self::Uplink),
            "Downlink" => Some(Self::Downlink),
            "Status" => Some(Self::Status),
            _ => None,
        }
    }
}

/// A topic split into its meaningful parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic {
    pub kind: TopicKind,
    pub device_id: DeviceId,
}

/// Builds and parses topics under a common root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    root: String,
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

impl TopicScheme {
    /// Create a scheme rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    /// Topic for a given kind and device.
    #[must_use]
    pub fn topic(&self, kind: TopicKind, device_id: &DeviceId) -> String {
        format!("{}/{}/{device_id}", self.root, kind.segment())
    }

    #[must_use]
    pub fn uplink(&self, device_id: &DeviceId) -> String {
        self.topic(TopicKind::Uplink, device_id)
    }

    #[must_use]
    pub fn downlink(&self, device_id: &DeviceId) -> String {
        self.topic(TopicKind::Downlink, device_id)
    }

    #[must_use]
    pub fn status(&self, device_id: &DeviceId) -> String {
        self.topic(TopicKind::Status, device_id)
    }

    /// Single-level wildcard filter for every device of a kind.
    #[must_use]
    pub fn wildcard(&self, kind: TopicKind) -> String {
        format!("{}/{}/+", self.root, kind.segment())
    }

    /// Split a concrete topic into kind and device id.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedPayload::Topic`] unless the topic has exactly three
    /// segments, our root, a known kind, and a valid device id.
    pub fn parse(&self, topic: &str) -> Result<ParsedTopic, MalformedPayload> {
        let malformed = || MalformedPayload::Topic(topic.to_string());

        let mut segments = topic.split('/');
        let (Some(root), Some(kind), Some(device), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(malformed());
        };

        if root != self.root {
            return Err(malformed());
        }
        let kind = TopicKind::from_segment(kind).ok_or_else(malformed)?;
        let device_id = DeviceId::new(device).map_err(|_| malformed())?;

        Ok(ParsedTopic { kind, device_id })
    }
}
