//! Error taxonomy for the sensor fleet core.
//!
//! Library operations return [`FleetError`]; the binaries wrap it in
//! `anyhow` at the top level. The scheduler decides per variant whether a
//! failure is fatal (bootstrap) or only skips the current sub-step.

use thiserror::Error;

/// Errors raised by store access and caller-supplied parameters.
#[derive(Debug, Error)]
pub enum FleetError {
    // ---
    /// The `sensors` relation is absent; the migrate binary has not run.
    #[error("sensors table not found; run sensorfleet-migrate first")]
    RegistryMissing,

    #[error("no sensors found in the registry")]
    EmptyFleet,

    #[error("Invalid bucket: {0}. Allowed buckets: minute, hour, day, week, month")]
    InvalidBucket(String),

    #[error("Invalid face: {0}. Allowed faces: north, east, south, west")]
    InvalidFace(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl FleetError {
    /// True for failures the worker loop may retry on its next tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, FleetError::Store(_))
    }
}

/// Result alias used throughout the library.
pub type FleetResult<T> = Result<T, FleetError>;
