use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelmerge_core::{
    load_config, validate_config, CatalogStore, Normalizer, PlaybackPreferences,
    PlaybackTransport, SqliteCatalogStore, VariantHealthLedger,
};
use reelmerge_server::{api::create_router, probe::HttpProbeTransport, state::AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("REELMERGE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    // Create SQLite catalog store
    let store: Arc<dyn CatalogStore> = Arc::new(
        SqliteCatalogStore::new(&config.database.path)
            .context("Failed to create catalog store")?,
    );
    info!("Catalog store initialized");

    let health = Arc::new(VariantHealthLedger::new(config.health.clone()));
    info!(
        "Health ledger: {} failures over {}h declares a variant dead",
        config.health.failure_threshold, config.health.dead_after_hours
    );

    let normalizer = Arc::new(Normalizer::new(
        store,
        Arc::clone(&health),
        PlaybackPreferences::from(&config.ranking),
        config.normalizer.clone(),
    ));

    let transport: Arc<dyn PlaybackTransport> = Arc::new(
        HttpProbeTransport::new(config.probe.timeout())
            .context("Failed to create probe HTTP client")?,
    );

    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&normalizer),
        health,
        transport,
    ));
    info!("Config hash: {}", state.config_hash());

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Last chance for entries the store refused earlier
    info!("Server shutting down...");
    let flush = normalizer.flush().await;
    if flush.failed > 0 {
        warn!(
            "{} entries could not be written to the store before exit",
            flush.failed
        );
    } else if flush.written > 0 {
        info!("Flushed {} pending entries", flush.written);
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
