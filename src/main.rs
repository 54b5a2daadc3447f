//! console-bridge-broker: the long-lived local observability daemon (C1-C8).

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use console_bridge_broker::config::Config;
use console_bridge_broker::correlator::Correlator;
use console_bridge_broker::hub::{ws_handler, ClientHub};
use console_bridge_broker::http::{create_router, AppState};
use console_bridge_broker::registry::TabRegistry;
use console_bridge_broker::store::log::LogStore;
use console_bridge_broker::store::net::NetStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "console_bridge_broker=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Arc::new(Config::from_env());
    let server_id = Uuid::new_v4().to_string();

    let pid_file = write_pid_file()?;

    let log_store = Arc::new(LogStore::new(config.max_logs, config.log_ttl));
    let net_store = Arc::new(NetStore::new(config.max_network, config.log_ttl));
    let registry = Arc::new(TabRegistry::new());
    let correlator = Arc::new(Correlator::new());
    let hub = Arc::new(ClientHub::new(
        log_store.clone(),
        net_store.clone(),
        registry.clone(),
        correlator.clone(),
    ));
    hub.clone().spawn_heartbeat_sweep(config.heartbeat_interval);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let ws_router = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(hub.clone())
        .layer(cors.clone())
        .layer(TraceLayer::new_for_http());

    let http_state = AppState {
        log_store,
        net_store,
        registry,
        correlator: correlator.clone(),
        hub: hub.clone(),
        config: config.clone(),
        server_id,
    };
    let http_router = create_router(http_state).layer(cors).layer(TraceLayer::new_for_http());

    let ws_listener = tokio::net::TcpListener::bind(("127.0.0.1", config.ws_port)).await?;
    let http_listener = tokio::net::TcpListener::bind(("127.0.0.1", config.discovery_port)).await?;
    tracing::info!(ws_port = config.ws_port, discovery_port = config.discovery_port, "console-bridge-broker listening");

    let ws_server = axum::serve(ws_listener, ws_router).with_graceful_shutdown(shutdown_signal());
    let http_server = axum::serve(http_listener, http_router).with_graceful_shutdown(shutdown_signal());

    let (ws_result, http_result) = tokio::join!(ws_server, http_server);
    ws_result?;
    http_result?;

    correlator.close();
    if let Some(path) = pid_file {
        let _ = std::fs::remove_file(path);
    }
    tracing::info!("console-bridge-broker shut down cleanly");
    Ok(())
}

/// Write this process's PID to the path named by `CONSOLE_BRIDGE_PID_FILE`
/// (set by the spawner), if any, so a later spawner invocation can detect a
/// crashed broker via the stale-PID check in [`console_bridge_broker::spawner`].
fn write_pid_file() -> std::io::Result<Option<std::path::PathBuf>> {
    let Ok(path) = std::env::var("CONSOLE_BRIDGE_PID_FILE") else {
        return Ok(None);
    };
    std::fs::write(&path, std::process::id().to_string())?;
    Ok(Some(std::path::PathBuf::from(path)))
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");

    tokio::select! {
        _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
        _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        _ = sighup.recv() => tracing::info!("received SIGHUP, shutting down"),
    }
}

