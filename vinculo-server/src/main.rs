//! vinculo-server - Relationship diagnostic HTTP service
//!
//! Serves scored quick/deep reports behind a payment gate, handles checkout and
//! payment callbacks, and collects leads and analytics events.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vinculo_common::config::ServiceConfig;
use vinculo_common::db::init_database;
use vinculo_server::geo::GeoResolver;
use vinculo_server::payments::{PaymentProvider, StripeProvider};
use vinculo_server::{build_router, AppState};

/// Command-line arguments for vinculo-server
#[derive(Parser, Debug)]
#[command(name = "vinculo-server")]
#[command(about = "Relationship diagnostic service")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "VINCULO_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config file
    #[arg(short, long, env = "VINCULO_BIND_ADDR")]
    bind: Option<String>,

    /// SQLite database path, overriding the config file
    #[arg(short, long, env = "VINCULO_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vinculo_server=info,vinculo_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Log build identification before any slow startup work
    info!(
        "Starting vinculo-server v{} [{}] built {} ({}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TARGET")
    );

    let args = Args::parse();

    let mut config = ServiceConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }

    let db_path = config.resolved_database_path();
    info!("Database path: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let payments = build_payment_provider(&config)?;
    let geo = GeoResolver::new(&config.geo);

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(pool, config, payments, geo);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    info!("vinculo-server listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Provider client, or `None` when no secret key is configured
///
/// Without a provider the service still serves reports; checkout and verification
/// answer with a configuration error.
fn build_payment_provider(config: &ServiceConfig) -> Result<Option<Arc<dyn PaymentProvider>>> {
    let Ok(secret_key) = config.payments.require_secret_key() else {
        warn!("payments.secret_key not configured; checkout and verification are disabled");
        return Ok(None);
    };

    let provider = StripeProvider::new(
        &config.payments.api_base,
        secret_key,
        Duration::from_millis(config.payments.request_timeout_ms),
    )
    .context("Failed to build payment provider client")?;

    info!("✓ Payment provider configured ({})", config.payments.api_base);
    let provider: Arc<dyn PaymentProvider> = Arc::new(provider);
    Ok(Some(provider))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        },
    }
}
