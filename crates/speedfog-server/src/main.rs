// crates/speedfog-server/src/main.rs
// ============================================================================
// Module: SpeedFog Server Entry Point
// Description: Wires the state store, room registry, race controller, and
// background monitor into one `axum` process serving the mod/spectator
// WebSocket endpoints, the organizer lifecycle routes, and `/healthz`
// (spec.md sections 5, 6; SPEC_FULL.md section C).
// Purpose: The only binary in the workspace; every other crate is a library.
// Dependencies: axum, clap, speedfog-config, speedfog-core, speedfog-race,
// speedfog-rooms, speedfog-ws, tokio, tracing-subscriber
// ============================================================================

mod admin;
mod health;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use axum::routing::get;
use axum::routing::post;
use axum::Router;
use clap::Parser;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use speedfog_config::SpeedfogConfig;
use speedfog_core::store::Store;
use speedfog_core::store_sqlite::SqliteStore;
use speedfog_core::store_sqlite::SqliteStoreConfig;
use speedfog_core::SystemClock;
use speedfog_race::LogPublisher;
use speedfog_race::NoopMetrics;
use speedfog_race::RaceController;
use speedfog_rooms::RoomRegistry;
use speedfog_ws::AnonymousAuthResolver;
use speedfog_ws::SessionTimeouts;
use speedfog_ws::WsState;

use crate::admin::force_finish_race;
use crate::admin::reset_race;
use crate::admin::start_race;
use crate::health::healthz;
use crate::health::HealthState;

/// SpeedFog realtime coordination server.
#[derive(Parser, Debug)]
#[command(name = "speedfog-server")]
struct Cli {
    /// Path to `speedfog.toml` (defaults to `SPEEDFOG_CONFIG` env var, then
    /// `./speedfog.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let config = match SpeedfogConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("speedfog-server: config error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("speedfog-server: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("failed to open store: {0}")]
    Store(#[from] speedfog_core::error::StoreError),
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

async fn run(config: SpeedfogConfig) -> Result<(), RunError> {
    let store_config = SqliteStoreConfig {
        path: config.storage.path(),
        journal_mode: config.storage.journal_mode(),
        busy_timeout_ms: 5_000,
    };
    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&store_config)?);

    let rooms = Arc::new(RoomRegistry::new(config.session.send_timeout()));
    let clock = Arc::new(SystemClock);
    let publisher = Arc::new(LogPublisher);
    let metrics = Arc::new(NoopMetrics);

    let controller = Arc::new(RaceController::new(
        Arc::clone(&store),
        Arc::clone(&rooms),
        Arc::clone(&clock) as Arc<dyn speedfog_core::Clock>,
        publisher,
        metrics.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let monitor_handle = tokio::spawn(speedfog_race::spawn_monitor_loop(
        Arc::clone(&store),
        Arc::clone(&controller),
        Arc::clone(&clock) as Arc<dyn speedfog_core::Clock>,
        metrics,
        config.monitor.to_race_monitor_config(),
        shutdown_rx,
    ));

    let timeouts = SessionTimeouts {
        auth_timeout: config.session.auth_timeout(),
        spectator_grace: config.session.spectator_grace(),
        heartbeat_interval: config.session.heartbeat_interval(),
    };
    let ws_state = Arc::new(
        WsState::new(
            Arc::clone(&store),
            Arc::clone(&rooms),
            Arc::clone(&controller),
            Arc::new(speedfog_resolve::ResolverTables::default()),
            Arc::clone(&clock) as Arc<dyn speedfog_core::Clock>,
            Arc::new(AnonymousAuthResolver),
        )
        .with_timeouts(timeouts),
    );

    let health_state = Arc::new(HealthState { store: Arc::clone(&store), rooms: Arc::clone(&rooms) });

    let admin_routes = Router::new()
        .route("/races/:race_id/start", post(start_race))
        .route("/races/:race_id/force-finish", post(force_finish_race))
        .route("/races/:race_id/reset", post(reset_race))
        .with_state(Arc::clone(&controller));

    let health_router = Router::new().route("/healthz", get(healthz)).with_state(health_state);

    let app = speedfog_ws::router(ws_state).merge(admin_routes).merge(health_router);

    let bind = config.server.bind_addr().map_err(|err| RunError::Bind(config.server.bind.clone(), io_error(&err)))?;
    let listener =
        tokio::net::TcpListener::bind(bind).await.map_err(|err| RunError::Bind(bind.to_string(), err))?;
    info!(%bind, "speedfog-server listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .map_err(RunError::Serve)?;

    if let Err(err) = monitor_handle.await {
        warn!(error = %err, "monitor task join failed");
    }
    Ok(())
}

fn io_error(config_err: &speedfog_config::ConfigError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, config_err.to_string())
}

async fn shutdown_signal(shutdown_tx: tokio::sync::watch::Sender<bool>) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let Ok(mut signal) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) else {
            return;
        };
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("shutdown signal received, draining connections");
    let _ = shutdown_tx.send(true);
}
