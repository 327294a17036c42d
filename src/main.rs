//! Entry point for the `sensorfleet-worker` binary.
//!
//! Startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection pool
//! - Bootstrapping the fleet (fatal if the schema is missing)
//! - Running the paced worker loop until the process is terminated
//!
//! The schema is never created here; run `sensorfleet-migrate` first.
//!
//! # Environment Variables
//! See [`sensorfleet::config::load_from_env`] for the full list. Logging is
//! controlled by `RUST_LOG` or `WORKER_LOG_LEVEL`, `WORKER_SPAN_EVENTS` and
//! `FORCE_COLOR`.
use anyhow::Result;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;

use sensorfleet::{config, telemetry, Bootstrapping};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    telemetry::init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let masked_url = config::mask_db_url(&cfg.db_url);
    tracing::info!("Attempting to connect to database: {}", masked_url);

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database '{}': {}", masked_url, e))?;

    tracing::info!("Successfully connected to database");

    let worker = Bootstrapping::new(pool, cfg).bootstrap().await?;
    worker.run().await;

    Ok(())
}
