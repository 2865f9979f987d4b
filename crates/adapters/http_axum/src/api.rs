//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod devices;

use axum::Router;
use axum::routing::{get, put};

use relayhub_app::ports::{DeviceRepository, PendingCommandStore, Transport};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<R, T, S>() -> Router<AppState<R, T, S>>
where
    R: DeviceRepository + Send + Sync + 'static,
    T: Transport + Send + Sync + 'static,
    S: PendingCommandStore + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/devices",
            get(devices::list::<R, T, S>).post(devices::create::<R, T, S>),
        )
        .route(
            "/devices/{id}",
            get(devices::get::<R, T, S>).delete(devices::delete::<R, T, S>),
        )
        .route("/devices/{id}/state", put(devices::set_state::<R, T, S>))
}
