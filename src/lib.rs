//! Core library for the `sensorfleet` worker.
//!
//! Simulates temperature sensors mounted on four building faces, writes a
//! synthetic reading per sensor each tick, and self-heals the fleet by
//! deleting sensors whose mean drifts too far from their face and
//! regenerating the missing codes.
//!
//! Module map (leaves first):
//! - `store` – Sensor Registry and Reading Store SQL
//! - `fleet` – keeps codes `1..=target` registered
//! - `generator` – per-tick synthetic readings and the malfunction designation
//! - `aggregator` – windowed per-face averages
//! - `detector` – out-of-range counts, pruning and the deviation report
//! - `scheduler` – bootstrap and the paced worker loop
//! - `schema` – table creation for the migrate binary and the registry check
//! - `telemetry` – tracing subscriber setup shared by both binaries
//!
//! This crate follows the Explicit Module Boundary Pattern (EMBP): shared
//! types are reached through the re-exports below rather than through the
//! file that defines them.

pub mod aggregator;
pub mod config;
pub mod detector;
mod error;
pub mod fleet;
pub mod generator;
mod models;
pub mod scheduler;
pub mod schema;
pub mod store;
pub mod telemetry;

pub use aggregator::{Bucket, FaceBucketAverage};
pub use config::Config;
pub use detector::{AllowedRange, SensorDeviation};
pub use error::{FleetError, FleetResult};
pub use generator::MalfunctionDesignation;
pub use models::{Face, NewReading, NewSensor, Reading, Sensor, TimeWindow, DEFAULT_STATUS};
pub use scheduler::{Bootstrapping, Running};
