//! Crypto Client Monitor — Entry Point
//!
//! Freshness and readiness sidecar for the tick ingestion pipeline.
//! Runs until SIGINT/SIGTERM.
//!
//! Wiring sequence:
//! 1. Load `.env`, then config.toml + env overrides + validate
//! 2. Init tracing (JSON structured logging), then report load warnings
//! 3. Install shutdown signal handler (shared cancellation token)
//! 4. Create lazy Postgres pool (StatsRepository port)
//! 5. Startup gate: wait for the datastore, fatal on deadline/cancel
//! 6. Serve /health, /metrics, /ready until shutdown, then drain

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crypto_client_monitor::adapters::metrics::MonitorServer;
use crypto_client_monitor::adapters::persistence::{PgRepositoryConfig, PgStatsRepository};
use crypto_client_monitor::config::{self, loader};
use crypto_client_monitor::usecases::{FreshnessMonitor, StartupGate};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let dotenv_warning = loader::load_dotenv();
    let config_path = std::env::var(loader::CONFIG_PATH_ENV)
        .unwrap_or_else(|_| loader::DEFAULT_CONFIG_PATH.to_string());
    let mut loaded = loader::load_config(&config_path).context("Failed to load configuration")?;
    loaded.warnings.extend(dotenv_warning);

    // ── 2. Initialize structured logging ────────────────────
    init_tracing(&loaded.config.logging);
    loaded.log();
    let config = loaded.config;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config,
        "Starting crypto client monitor"
    );

    // ── 3. Shutdown signal shared by startup gate and server ─
    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    // ── 4. Lazy Postgres pool ───────────────────────────────
    let repo = Arc::new(
        PgStatsRepository::connect_lazy(&PgRepositoryConfig {
            url: config.database.url.clone(),
            max_connections: config.database.max_connections,
            acquire_timeout: config.probe_timeout(),
        })
        .context("Failed to create datastore client")?,
    );

    // ── 5. Wait for the datastore (fatal on failure) ────────
    info!("Waiting for database...");
    let gate = StartupGate::new(
        config.startup_interval(),
        config.startup_timeout(),
        config.probe_timeout(),
    );
    gate.wait_until_ready(&*repo, &shutdown)
        .await
        .context("Database is not ready")?;

    // ── 6. Serve until shutdown ─────────────────────────────
    let monitor = FreshnessMonitor::new(
        repo.clone(),
        config.monitor.tickers.clone(),
        config.policy(),
        config.probe_timeout(),
    );
    let server = MonitorServer::new(
        monitor,
        config.server.addr.clone(),
        config.shutdown_timeout(),
        config.read_header_timeout(),
    );
    let result = server.run(shutdown).await;

    repo.close().await;
    info!("Shutdown complete");
    result
}

/// JSON or plain output; `RUST_LOG` overrides the configured level.
fn init_tracing(logging: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.log_level));

    if logging.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Cancel `shutdown` on SIGINT or SIGTERM.
async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("SIGINT received, initiating graceful shutdown"),
        () = terminate => info!("SIGTERM received, initiating graceful shutdown"),
    }

    shutdown.cancel();
}
