//! Scheduler: the worker's two-state lifecycle.
//!
//! [`Bootstrapping`] verifies the registry, fills the fleet and picks the
//! malfunction designation, then hands over a [`Running`] worker. `Running`
//! owns everything the loop mutates (the known sensor codes, the RNG and the
//! last check time), so each tick reads and updates it explicitly.
//!
//! Per tick: generate one batch of readings, and once the aggregation
//! interval has elapsed, prune every face against its windowed average and
//! top the fleet back up. Store failures inside a tick are logged and skip
//! only the affected sub-step.

use std::collections::BTreeMap;

use chrono::Utc;
use rand::{rngs::StdRng, SeedableRng};
use sqlx::PgPool;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::{
    aggregator, detector, fleet, generator, schema, store, AllowedRange, Config, Face,
    FleetError, FleetResult, MalfunctionDesignation, TimeWindow,
};

// ---

/// A worker that has not yet touched the store.
pub struct Bootstrapping {
    pool: PgPool,
    cfg: Config,
    rng: StdRng,
}

/// A bootstrapped worker ready to tick.
pub struct Running {
    pool: PgPool,
    cfg: Config,
    rng: StdRng,
    sensors: Vec<i32>,
    malfunctioning: MalfunctionDesignation,
    /// Unix seconds of the last aggregation check.
    last_check: i64,
    /// First second the next check aggregates over.
    window_start: i64,
    /// Set when a generation batch failed, so the next check reloads codes.
    refresh_pending: bool,
}

/// Outcome of one aggregation check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckReport {
    pub face_averages: BTreeMap<Face, f64>,
    pub pruned: BTreeMap<Face, u64>,
    pub regenerated: u64,
}

impl CheckReport {
    pub fn total_pruned(&self) -> u64 {
        self.pruned.values().sum()
    }
}

/// Outcome of one tick; `None` marks a sub-step that failed or did not run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub inserted: Option<u64>,
    pub check: Option<CheckReport>,
}

impl Bootstrapping {
    // ---
    pub fn new(pool: PgPool, cfg: Config) -> Self {
        // ---
        let rng = match cfg.malfunction_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { pool, cfg, rng }
    }

    /// Prepare the fleet and transition to [`Running`].
    ///
    /// Fails with [`FleetError::RegistryMissing`] when the schema has not
    /// been created; every error here is fatal to the worker.
    pub async fn bootstrap(mut self) -> FleetResult<Running> {
        // ---
        if !schema::registry_exists(&self.pool).await? {
            error!("Sensors table not found; refusing to start");
            return Err(FleetError::RegistryMissing);
        }

        fleet::ensure_fleet(&self.pool, self.cfg.fleet_target, &mut self.rng).await?;

        let sensors = store::list_codes(&self.pool).await?;
        if sensors.is_empty() {
            return Err(FleetError::EmptyFleet);
        }
        info!("Starting sensor worker for {} sensors", sensors.len());

        let malfunctioning =
            MalfunctionDesignation::select(&sensors, self.cfg.malfunction_ratio, &mut self.rng);
        info!(
            "Designated {} sensors as malfunctioning",
            malfunctioning.len()
        );

        let started_at = Utc::now().timestamp();
        Ok(Running {
            pool: self.pool,
            cfg: self.cfg,
            rng: self.rng,
            sensors,
            malfunctioning,
            last_check: started_at,
            window_start: started_at,
            refresh_pending: false,
        })
    }
}

impl Running {
    // ---
    /// Sensor codes the next tick will generate readings for.
    pub fn sensors(&self) -> &[i32] {
        &self.sensors
    }

    pub fn malfunctioning(&self) -> &MalfunctionDesignation {
        &self.malfunctioning
    }

    /// Tick forever, pacing each iteration to the configured period.
    pub async fn run(mut self) {
        // ---
        loop {
            let started = Instant::now();
            self.tick().await;
            let elapsed = started.elapsed();
            sleep(self.cfg.tick_period.saturating_sub(elapsed)).await;
        }
    }

    /// One loop iteration without the pacing sleep.
    pub async fn tick(&mut self) -> TickReport {
        // ---
        let timestamp = Utc::now().timestamp();
        let inserted = match generator::generate_tick(
            &self.pool,
            &self.sensors,
            &self.malfunctioning,
            timestamp,
            &mut self.rng,
        )
        .await
        {
            Ok(count) => {
                debug!("Inserted {} temperature readings in this iteration", count);
                Some(count)
            }
            Err(e) => {
                error!(
                    error = %e,
                    transient = e.is_transient(),
                    "Reading generation failed; skipping this tick's batch"
                );
                self.refresh_pending = true;
                None
            }
        };

        let now = Utc::now().timestamp();
        let check = if self.check_due(now) {
            let (window, next_start) = check_window(self.window_start, now);
            let report = self.check(window).await;
            self.last_check = now;
            self.window_start = next_start;
            Some(report)
        } else {
            None
        };

        TickReport { inserted, check }
    }

    fn check_due(&self, now: i64) -> bool {
        // ---
        let secs = self.cfg.aggregation_interval.as_secs();
        now - self.last_check >= i64::try_from(secs).unwrap_or(i64::MAX)
    }

    /// Prune every face against its windowed average, then top up the fleet.
    async fn check(&mut self, window: TimeWindow) -> CheckReport {
        // ---
        info!(
            start = ?window.start,
            end = ?window.end,
            "Running aggregation check"
        );
        let mut report = CheckReport::default();

        let bucket = self.cfg.aggregation_bucket;
        match aggregator::overall_face_average(&self.pool, bucket, window).await {
            Ok(averages) => report.face_averages = averages,
            Err(e) => error!(error = %e, "Aggregation failed; skipping pruning"),
        }

        for (&face, &avg) in &report.face_averages {
            info!("Face: {} - Overall Average Temperature: {}", face, avg);
            let range = match AllowedRange::around(avg, self.cfg.deviation_tolerance) {
                Ok(range) => range,
                Err(e) => {
                    warn!(%face, error = %e, "Cannot derive allowed range");
                    continue;
                }
            };
            info!(
                "For face {}, allowed temperature range: [{}, {}]",
                face, range.min, range.max
            );

            match self.prune_if_needed(face, range).await {
                Ok(0) => debug!("No malfunctioning sensors to delete on face {}", face),
                Ok(deleted) => {
                    info!(
                        "Deleted {} malfunctioning sensors on face {}",
                        deleted, face
                    );
                    report.pruned.insert(face, deleted);
                }
                Err(e) => error!(%face, error = %e, "Pruning failed"),
            }
        }

        match self.top_up().await {
            Ok(created) => report.regenerated = created,
            Err(e) => error!(error = %e, "Fleet top-up failed"),
        }

        report
    }

    async fn prune_if_needed(&self, face: Face, range: AllowedRange) -> FleetResult<u64> {
        // ---
        let out_of_range = detector::count_out_of_range(&self.pool, face, range).await?;
        if out_of_range == 0 {
            return Ok(0);
        }
        detector::prune_face(&self.pool, face, range).await
    }

    /// Regenerate missing codes and reload the in-memory sensor list.
    async fn top_up(&mut self) -> FleetResult<u64> {
        // ---
        let live = store::count_sensors(&self.pool).await?;
        let target = self.cfg.fleet_target;

        let mut created = 0;
        if live < i64::from(target) {
            created = fleet::ensure_fleet(&self.pool, target, &mut self.rng).await?;
        } else if !self.refresh_pending {
            debug!("Total sensors remain at {}. No regeneration needed.", live);
            return Ok(0);
        }

        self.sensors = store::list_codes(&self.pool).await?;
        self.refresh_pending = false;
        info!("Sensor list updated. Total sensors: {}", self.sensors.len());
        Ok(created)
    }
}

/// Window for a check running at `now`, plus where the following one starts.
///
/// Both bounds are inclusive, so the next window begins one second after
/// `now` and consecutive checks never aggregate the same second twice.
fn check_window(start: i64, now: i64) -> (TimeWindow, i64) {
    // ---
    (TimeWindow::between(start, now), now + 1)
}
