//! Tally campaign engagement service.
//!
//! Main entry point. Initializes tracing and configuration, establishes
//! the database pool, starts the background pipeline and the HTTP
//! ingestion server, and coordinates graceful shutdown.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tally_api::{AppState, Config};
use tally_core::{storage, RealClock};
use tally_pipeline::Pipeline;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Starting tally campaign engagement service");

    let config = Config::load()?;
    let server_addr = config.parse_server_addr()?;
    info!(
        database_url = %config.database_url_masked(),
        server_addr = %server_addr,
        max_connections = config.database_max_connections,
        "Configuration loaded"
    );

    let db_pool = create_database_pool(&config).await?;
    info!("Database connection pool established");

    storage::ensure_schema(&db_pool).await.context("Failed to ensure database schema")?;
    info!("Database schema ready");

    let clock = std::sync::Arc::new(RealClock::new());
    let storage = storage::Storage::new(db_pool.clone());

    let mut pipeline = Pipeline::new(storage.clone(), clock.clone(), config.to_pipeline_config());
    pipeline.start();

    let state = AppState::new(storage, clock);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = tally_api::start_server(state, server_addr).await {
            error!(error = %e, "Server failed");
        }
    });

    info!(addr = %server_addr, "Tally is ready to receive webhooks");

    // The server resolves once its signal handler sees SIGINT/SIGTERM and
    // in-flight requests have drained.
    if let Err(e) = server_handle.await {
        error!(error = %e, "Server task panicked");
    }

    pipeline.shutdown().await;

    db_pool.close().await;
    info!("Database connections closed");

    info!("Tally shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,tally=debug,tower_http=debug"))
        .expect("Invalid RUST_LOG environment variable");

    let fmt_layer = fmt::layer().with_target(true).with_file(true).with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Creates the database connection pool with retry logic.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    let mut retries = 0;
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connection_timeout))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                sqlx::query("SELECT 1")
                    .fetch_one(&pool)
                    .await
                    .context("Failed to verify database connection")?;

                return Ok(pool);
            },
            Err(_e) if retries < MAX_RETRIES => {
                retries += 1;
                info!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    "Database connection failed, retrying..."
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to create database connection pool after retries");
            },
        }
    }
}
