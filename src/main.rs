//! Herald Server: presence tracking and domain event fan-out.
//!
//! Main entry point that wires all crates together and runs the relay.

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

use herald_cache::PresenceStoreManager;
use herald_core::config::AppConfig;
use herald_core::error::AppError;
use herald_realtime::HeraldEngine;
use herald_worker::{EventRelay, MessageBusManager};

#[tokio::main]
async fn main() {
    let env = std::env::var("HERALD_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Herald v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Presence store ───────────────────────────────────
    tracing::info!(provider = %config.presence.provider, "Initializing presence store...");
    let store = PresenceStoreManager::new(&config.presence).await?.store();

    // ── Step 2: Message bus ──────────────────────────────────────
    tracing::info!(provider = %config.bus.provider, "Initializing message bus...");
    let bus = MessageBusManager::connect(&config.bus).await?;

    // ── Step 3: Engine (gateway, tokens, presence) ───────────────
    let engine = HeraldEngine::new(&config, store, bus.clone())?;
    if !engine.health_check().await? {
        return Err(AppError::service_unavailable(
            "Presence store or message bus failed its health check",
        ));
    }

    // ── Step 4: Event relay ──────────────────────────────────────
    let relay = EventRelay::new(bus, engine.gateway.clone(), config.bus.clone());
    relay.setup().await?;

    let cancel = CancellationToken::new();
    let relay_task = {
        let relay = relay.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { relay.run(cancel).await })
    };

    // ── Step 5: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, draining relay consumers...");
    cancel.cancel();

    if let Err(e) = relay_task.await {
        tracing::error!(error = %e, "Relay task failed");
    }

    tracing::info!(
        relay = ?relay.metrics().snapshot(),
        gateway = ?engine.gateway.metrics().snapshot(),
        presence = ?engine.publisher.metrics().snapshot(),
        "Herald shut down complete"
    );
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
