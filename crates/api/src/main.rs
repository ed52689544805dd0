use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chartgen_events::EventBus;
use chartgen_pipeline::{BatchConfig, BatchJobManager};
use chartgen_providers::{build_fallback_client, ProviderConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chartgen_api::background;
use chartgen_api::config::ServerConfig;
use chartgen_api::router::build_app_router;
use chartgen_api::state::AppState;

const DEFAULT_LOG_FILTER: &str =
    "chartgen_api=debug,chartgen_pipeline=debug,chartgen_providers=info,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let batch_config = BatchConfig::from_env();
    let provider_config = ProviderConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    tracing::info!(
        max_concurrent_jobs = batch_config.max_concurrent_jobs,
        max_concurrent_items = batch_config.max_concurrent_items,
        "Loaded batch configuration",
    );

    // --- Providers ---
    let generator = Arc::new(build_fallback_client(&provider_config));
    if generator.is_empty() {
        tracing::warn!("No generation providers configured, every item will fail");
    }

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // --- Batch engine ---
    let manager = Arc::new(BatchJobManager::new(
        generator,
        Arc::clone(&event_bus),
        batch_config.clone(),
    ));

    // Spawn job retention (removes old terminal jobs).
    let background_cancel = CancellationToken::new();
    let retention_handle = tokio::spawn(background::job_retention::run(
        Arc::clone(&manager),
        batch_config.job_retention_hours,
        batch_config.cleanup_interval(),
        background_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        manager: Arc::clone(&manager),
        event_bus: Arc::clone(&event_bus),
    };

    // --- Router (shared with integration tests) ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let host = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    manager.shutdown();

    background_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;
    tracing::info!("Background tasks stopped");

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Install the global subscriber: `RUST_LOG` filter, human-readable output,
/// or JSON lines when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
