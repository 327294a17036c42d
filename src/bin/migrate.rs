//! Schema bootstrap for `sensorfleet`.
//!
//! Creates the `sensors` and `sensor_data` relations the worker expects.
//! Idempotent; run it before the first `sensorfleet-worker` start.
//!
//! Requires `DATABASE_URL`.
use anyhow::{Context, Result};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;

use sensorfleet::{config, schema, telemetry};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    telemetry::init_tracing();

    let db_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set in .env or environment")?;
    let masked_url = config::mask_db_url(&db_url);

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&db_url)
        .await
        .with_context(|| format!("Failed to connect to database '{}'", masked_url))?;

    let existed = schema::registry_exists(&pool).await?;
    schema::create_schema(&pool).await?;

    if existed {
        tracing::info!("Schema already present; nothing to create");
    } else {
        tracing::info!("Created sensors and sensor_data tables");
    }
    Ok(())
}
