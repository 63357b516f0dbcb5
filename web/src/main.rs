//! Fieldserve booking server.
//!
//! ```bash
//! PORT=4000 RETRY_CEILING=3 cargo run --bin fieldserve
//! ```
//!
//! See [`Config`] for every environment variable.

use anyhow::Context;
use fieldserve_core::BookingStateMachine;
use fieldserve_core::registry::InMemoryProviderRegistry;
use fieldserve_web::{AppState, Config, build_router, telemetry};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = Config::from_env();
    telemetry::init_tracing(&format!(
        "fieldserve={level},fieldserve_core={level},fieldserve_web={level},tower_http=debug",
        level = config.server.log_level
    ));

    info!("Starting Fieldserve booking server");

    let roster = config
        .load_roster()
        .context("Failed to load provider roster")?;
    info!(providers = roster.len(), "Provider roster loaded");

    let machine = BookingStateMachine::builder()
        .providers(InMemoryProviderRegistry::with_providers(roster))
        .policy(config.retry_policy())
        .build();
    info!(
        retry_ceiling = config.booking.retry_ceiling,
        reset_on_revive = config.booking.reset_retries_on_revive,
        "Booking state machine ready"
    );

    let mut state = AppState::new(machine);
    if config.metrics_enabled {
        match telemetry::install_prometheus() {
            Ok(handle) => {
                state = state.with_metrics(handle);
                info!("Prometheus metrics exposed at /metrics");
            }
            Err(error) => warn!(%error, "Metrics disabled: recorder install failed"),
        }
    }

    let app = build_router(state, &config.server.api_prefix);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;

    info!(
        address = %address,
        api_prefix = %config.server.api_prefix,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            warn!(%error, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                warn!(%error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
