//! Configuration loader for the `sensorfleet` worker.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
//!
use std::{env, time::Duration};

use anyhow::{anyhow, Result};

use crate::Bucket;

/// Parse an optional environment variable of type `$ty` with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed worker configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Number of sensor codes the fleet is held at (`1..=fleet_target`).
    pub fleet_target: i32,

    /// Wall-clock period of one tick.
    pub tick_period: Duration,

    /// Minimum time between aggregation/pruning checks.
    pub aggregation_interval: Duration,

    /// Bucket granularity used for the windowed face averages.
    pub aggregation_bucket: Bucket,

    /// Allowed deviation from a face average, as a fraction.
    pub deviation_tolerance: f64,

    /// Fraction of the fleet designated as malfunctioning at startup.
    pub malfunction_ratio: f64,

    /// Seed for the worker RNG; `None` seeds from OS entropy.
    pub malfunction_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        // ---
        Self {
            db_url: String::new(),
            db_pool_max: 5,
            fleet_target: 10_000,
            tick_period: Duration::from_millis(1_000),
            aggregation_interval: Duration::from_secs(1),
            aggregation_bucket: Bucket::Minute,
            deviation_tolerance: 0.20,
            malfunction_ratio: 0.01,
            malfunction_seed: None,
        }
    }
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `FLEET_TARGET_COUNT` – fleet size (default: 10000)
/// - `TICK_PERIOD_MS` – tick pacing (default: 1000)
/// - `AGGREGATION_INTERVAL_SECS` – seconds between pruning checks (default: 1)
/// - `AGGREGATION_BUCKET` – minute|hour|day|week|month (default: minute)
/// - `DEVIATION_TOLERANCE` – allowed ± fraction around a face average (default: 0.20)
/// - `MALFUNCTION_RATIO` – designated fraction of the fleet (default: 0.01)
/// - `MALFUNCTION_SEED` – fixed RNG seed for reproducible runs (default: unset)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let defaults = Config::default();

    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env!("DB_POOL_MAX", u32, defaults.db_pool_max);
    let fleet_target = parse_env!("FLEET_TARGET_COUNT", i32, defaults.fleet_target);
    let tick_ms = parse_env!("TICK_PERIOD_MS", u64, 1_000);
    let interval_secs = parse_env!("AGGREGATION_INTERVAL_SECS", u64, 1);
    let aggregation_bucket = parse_env!("AGGREGATION_BUCKET", Bucket, defaults.aggregation_bucket);
    let deviation_tolerance = parse_env!("DEVIATION_TOLERANCE", f64, defaults.deviation_tolerance);
    let malfunction_ratio = parse_env!("MALFUNCTION_RATIO", f64, defaults.malfunction_ratio);
    let malfunction_seed = env::var("MALFUNCTION_SEED")
        .ok()
        .map(|v| v.parse::<u64>())
        .transpose()
        .map_err(|e| anyhow!("Invalid MALFUNCTION_SEED: {}", e))?;

    let cfg = Config {
        db_url,
        db_pool_max,
        fleet_target,
        tick_period: Duration::from_millis(tick_ms),
        aggregation_interval: Duration::from_secs(interval_secs),
        aggregation_bucket,
        deviation_tolerance,
        malfunction_ratio,
        malfunction_seed,
    };
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    /// Reject values the worker cannot run with.
    pub fn validate(&self) -> Result<()> {
        // ---
        if self.fleet_target < 1 {
            return Err(anyhow!(
                "FLEET_TARGET_COUNT must be at least 1, got {}",
                self.fleet_target
            ));
        }
        if !(self.deviation_tolerance.is_finite() && self.deviation_tolerance >= 0.0) {
            return Err(anyhow!(
                "DEVIATION_TOLERANCE must be a non-negative fraction, got {}",
                self.deviation_tolerance
            ));
        }
        if !(0.0..=1.0).contains(&self.malfunction_ratio) {
            return Err(anyhow!(
                "MALFUNCTION_RATIO must be within [0, 1], got {}",
                self.malfunction_ratio
            ));
        }
        Ok(())
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords while showing
    /// all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!(
            "  DATABASE_URL              : {}",
            mask_db_url(&self.db_url)
        );
        tracing::info!("  DB_POOL_MAX               : {}", self.db_pool_max);
        tracing::info!("  FLEET_TARGET_COUNT        : {}", self.fleet_target);
        tracing::info!(
            "  TICK_PERIOD_MS            : {}",
            self.tick_period.as_millis()
        );
        tracing::info!(
            "  AGGREGATION_INTERVAL_SECS : {}",
            self.aggregation_interval.as_secs()
        );
        tracing::info!("  AGGREGATION_BUCKET        : {}", self.aggregation_bucket);
        tracing::info!("  DEVIATION_TOLERANCE       : {}", self.deviation_tolerance);
        tracing::info!("  MALFUNCTION_RATIO         : {}", self.malfunction_ratio);
        tracing::info!("  MALFUNCTION_SEED          : {:?}", self.malfunction_seed);
    }
}

/// Replace the password in `user:password@host` style URLs with `****`.
pub fn mask_db_url(db_url: &str) -> String {
    // ---
    if let Some(at_pos) = db_url.rfind('@') {
        if let Some(colon_pos) = db_url[..at_pos].rfind(':') {
            // a colon right after "scheme://" belongs to the scheme, not a password
            if !db_url[colon_pos..].starts_with("://") {
                return format!("{}:****{}", &db_url[..colon_pos], &db_url[at_pos..]);
            }
        }
    }
    db_url.to_string()
}
