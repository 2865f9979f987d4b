//! Shared application state for axum handlers.

use std::sync::Arc;

use relayhub_app::ports::{DeviceRepository, PendingCommandStore, Transport};
use relayhub_app::services::relay_service::RelayService;

/// Application state shared across all axum handlers.
///
/// Generic over the device repository, transport and pending store to avoid
/// dynamic dispatch. `Clone` is implemented manually so the underlying types
/// themselves do not need to be `Clone`; only the `Arc` is cloned.
pub struct AppState<R, T, S> {
    /// Relay façade: device CRUD and acknowledged state changes.
    pub relay: Arc<RelayService<R, T, S>>,
}

impl<R, T, S> Clone for AppState<R, T, S> {
    fn clone(&self) -> Self {
        Self {
            relay: Arc::clone(&self.relay),
        }
    }
}

impl<R, T, S> AppState<R, T, S>
where
    R: DeviceRepository + Send + Sync + 'static,
    T: Transport + Send + Sync + 'static,
    S: PendingCommandStore + Send + Sync + 'static,
{
    /// Create a new application state from a service instance.
    pub fn new(relay: RelayService<R, T, S>) -> Self {
        Self {
            relay: Arc::new(relay),
        }
    }

    /// Create a new application state from a pre-wrapped service.
    ///
    /// Use this when the service is also shared with background tasks.
    pub fn from_arc(relay: Arc<RelayService<R, T, S>>) -> Self {
        Self { relay }
    }
}
