//! Axum router assembly.

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::get;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use relayhub_app::link::LinkStatus;
use relayhub_app::ports::{DeviceRepository, PendingCommandStore, Transport};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Nests API routes under `/api` and includes a [`TraceLayer`] that logs each
/// HTTP request/response at the `DEBUG` level using the `tracing` ecosystem.
pub fn build<R, T, S>(state: AppState<R, T, S>) -> Router
where
    R: DeviceRepository + Send + Sync + 'static,
    T: Transport + Send + Sync + 'static,
    S: PendingCommandStore + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check::<R, T, S>))
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    link: &'static str,
}

async fn health_check<R, T, S>(State(state): State<AppState<R, T, S>>) -> Json<Health>
where
    R: DeviceRepository + Send + Sync + 'static,
    T: Transport + Send + Sync + 'static,
    S: PendingCommandStore + Send + Sync + 'static,
{
    let link = match state.relay.link_status() {
        LinkStatus::Online => "online",
        LinkStatus::Degraded => "degraded",
    };
    Json(Health { status: "ok", link })
}
