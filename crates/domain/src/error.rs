//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`RelayError`]
//! at the port boundary. Adapter failures travel as boxed sources inside
//! [`RelayError::Persistence`] or [`RelayError::Transport`].

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error returned by domain and application operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A domain invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// The requested record does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// The record clashes with an existing one.
    #[error("conflict")]
    Conflict(#[from] ConflictError),

    /// An inbound topic or payload could not be understood.
    #[error("malformed payload")]
    Malformed(#[from] MalformedPayload),

    /// The persistence collaborator failed.
    #[error("persistence error")]
    Persistence(#[source] BoxError),

    /// The publish/subscribe transport failed.
    #[error("transport error")]
    Transport(#[source] BoxError),
}

impl RelayError {
    /// Wrap any error as a persistence failure.
    pub fn persistence(err: impl Into<BoxError>) -> Self {
        Self::Persistence(err.into())
    }

    /// Wrap any error as a transport failure.
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }
}

/// Domain invariant violations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A device name must not be empty.
    #[error("name must not be empty")]
    EmptyName,

    /// A device identifier must not be empty.
    #[error("device id must not be empty")]
    EmptyDeviceId,

    /// A device identifier must be usable as a single topic segment.
    #[error("device id {0:?} contains a reserved topic character")]
    InvalidDeviceId(String),

    /// The requested state is neither `on` nor `off`.
    #[error("unknown device state {0:?}")]
    UnknownState(String),
}

/// A lookup returned nothing.
#[derive(Debug, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    /// Kind of record that was looked up (e.g. `"Device"`).
    pub entity: &'static str,
    /// Identifier that was looked up.
    pub id: String,
}

/// A create request collides with an existing record.
#[derive(Debug, thiserror::Error)]
#[error("{entity} with {field} {value:?} already exists")]
pub struct ConflictError {
    /// Kind of record (e.g. `"Device"`).
    pub entity: &'static str,
    /// Field holding the duplicated value.
    pub field: &'static str,
    /// The duplicated value.
    pub value: String,
}

/// Why an inbound message was rejected.
#[derive(Debug, thiserror::Error)]
pub enum MalformedPayload {
    /// The topic does not follow `{root}/{kind}/{device_id}`.
    #[error("unexpected topic format {0:?}")]
    Topic(String),

    /// The payload is not the JSON shape we expect.
    #[error("invalid JSON payload")]
    Json(#[from] serde_json::Error),

    /// The payload is valid JSON but names a different device than its topic.
    #[error("payload device {payload:?} does not match topic device {topic:?}")]
    DeviceMismatch {
        /// Device id carried by the topic.
        topic: String,
        /// Device id carried by the payload.
        payload: String,
    },
}
