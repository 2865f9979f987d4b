//! # relayhubd — relayhub daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (`relayhub.toml` plus env overrides)
//! - Install the tracing subscriber
//! - Open the `SQLite` pool and run migrations
//! - Connect to the MQTT broker and spawn the inbound dispatcher
//! - Build the axum router over the relay service and serve it
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no relay logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use relayhub_adapter_http_axum::state::AppState;
use relayhub_adapter_storage_sqlite_sqlx::Config as StorageConfig;
use relayhub_app::coordinator::AckCoordinator;
use relayhub_app::dispatcher::Dispatcher;
use relayhub_app::link::LinkMonitor;
use relayhub_app::services::relay_service::RelayService;
use relayhub_domain::topic::TopicScheme;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    init_tracing(&config.logging.filter);

    // Database
    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("failed to open database")?;

    // Transport
    let (transport, inbound) = relayhub_adapter_mqtt::connect(&config.mqtt)
        .await
        .context("failed to connect to MQTT broker")?;
    let transport = Arc::new(transport);

    // Core
    let coordinator = Arc::new(AckCoordinator::new(
        Arc::clone(&transport),
        db.pending_commands(),
        TopicScheme::new(config.relay.topic_root.clone()),
        config.ack_timeout(),
    ));
    let link = LinkMonitor::new();
    let dispatcher = Dispatcher::new(db.devices(), Arc::clone(&coordinator), link.clone());
    let dispatch_task = tokio::spawn(dispatcher.run(inbound));

    // HTTP
    let relay = RelayService::new(db.devices(), coordinator, link);
    let app = relayhub_adapter_http_axum::router::build(AppState::new(relay));

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "relayhubd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    tracing::info!("shutting down");
    transport.shutdown(SHUTDOWN_GRACE).await;
    if tokio::time::timeout(SHUTDOWN_GRACE, dispatch_task)
        .await
        .is_err()
    {
        tracing::warn!("dispatcher did not stop in time");
    }
    db.close().await;

    Ok(())
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|err| {
        eprintln!("invalid log filter {filter:?}: {err}, falling back to info");
        EnvFilter::new("info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "unable to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
