//! Reading Generator: one synthetic reading per live sensor per tick.
//!
//! Two inputs decide a reading's value: the sensor code and the run's
//! [`MalfunctionDesignation`]. Designated sensors draw from one of two
//! abnormal bands, everyone else from the normal band. All values have
//! one-decimal granularity:
//!
//! | band   | range (°C)   |
//! |--------|--------------|
//! | low    | 10.0 – 14.0  |
//! | normal | 15.0 – 30.0  |
//! | high   | 30.0 – 35.0  |
//!
//! The normal and high bands touch only at 30.0.

use std::{collections::HashSet, ops::RangeInclusive};

use rand::{seq::SliceRandom, Rng};
use sqlx::PgPool;

use crate::{store, FleetResult, NewReading};

// ---

/// A temperature band expressed in tenths of a degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Low,
    Normal,
    High,
}

impl Band {
    // ---
    pub fn tenths(&self) -> RangeInclusive<i32> {
        match self {
            Band::Low => 100..=140,
            Band::Normal => 150..=300,
            Band::High => 300..=350,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        let tenths = (value * 10.0).round() as i32;
        self.tenths().contains(&tenths)
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        f64::from(rng.gen_range(self.tenths())) / 10.0
    }
}

/// Draw one temperature. Malfunctioning sensors pick low or high 50/50.
pub fn sample_temperature<R: Rng + ?Sized>(rng: &mut R, malfunctioning: bool) -> f64 {
    // ---
    if !malfunctioning {
        return Band::Normal.sample(rng);
    }
    if rng.gen_bool(0.5) {
        Band::Low.sample(rng)
    } else {
        Band::High.sample(rng)
    }
}

/// Sensor codes chosen once at startup to emit abnormal values for this run.
///
/// Lives only in memory and is unrelated to the store-driven deviation
/// detection in [`crate::detector`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MalfunctionDesignation {
    codes: HashSet<i32>,
}

impl MalfunctionDesignation {
    // ---
    /// Pick `floor(len * ratio)` codes (at least one) uniformly from `codes`.
    ///
    /// An empty fleet yields an empty designation.
    pub fn select<R: Rng + ?Sized>(codes: &[i32], ratio: f64, rng: &mut R) -> Self {
        // ---
        if codes.is_empty() {
            return Self::default();
        }
        let wanted = ((codes.len() as f64 * ratio).floor() as usize).clamp(1, codes.len());
        Self {
            codes: codes.choose_multiple(rng, wanted).copied().collect(),
        }
    }

    pub fn from_codes(codes: impl IntoIterator<Item = i32>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
        }
    }

    pub fn contains(&self, code: i32) -> bool {
        self.codes.contains(&code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Prepare exactly one reading per sensor code, all stamped `timestamp`.
pub fn build_tick<R: Rng + ?Sized>(
    sensors: &[i32],
    malfunctioning: &MalfunctionDesignation,
    timestamp: i64,
    rng: &mut R,
) -> Vec<NewReading> {
    // ---
    sensors
        .iter()
        .map(|&code| NewReading {
            sensor_id: code,
            timestamp,
            temperature_value: sample_temperature(rng, malfunctioning.contains(code)),
        })
        .collect()
}

/// Generate and persist one tick of readings as a single atomic batch.
///
/// Returns the number of readings written.
pub async fn generate_tick<R: Rng + ?Sized>(
    pool: &PgPool,
    sensors: &[i32],
    malfunctioning: &MalfunctionDesignation,
    timestamp: i64,
    rng: &mut R,
) -> FleetResult<u64> {
    // ---
    let batch = build_tick(sensors, malfunctioning, timestamp, rng);
    store::insert_readings(pool, &batch).await
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn normal_readings_stay_in_the_normal_band() {
        // ---
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..5_000 {
            let t = sample_temperature(&mut rng, false);
            assert!((15.0..=30.0).contains(&t), "normal reading {t} out of band");
        }
    }

    #[test]
    fn malfunction_readings_avoid_the_normal_interior() {
        // ---
        let mut rng = StdRng::seed_from_u64(2);
        let (mut low, mut high) = (0, 0);
        for _ in 0..5_000 {
            let t = sample_temperature(&mut rng, true);
            if Band::Low.contains(t) {
                assert!((10.0..=14.0).contains(&t));
                low += 1;
            } else {
                assert!(
                    (30.0..=35.0).contains(&t),
                    "abnormal reading {t} out of band"
                );
                high += 1;
            }
        }
        // 50/50 split; both sides must show up
        assert!(low > 2_000 && high > 2_000, "low={low} high={high}");
    }

    #[test]
    fn readings_have_one_decimal_granularity() {
        // ---
        let mut rng = StdRng::seed_from_u64(3);
        for malfunctioning in [false, true] {
            for _ in 0..500 {
                let t = sample_temperature(&mut rng, malfunctioning);
                let scaled = t * 10.0;
                assert!(
                    (scaled - scaled.round()).abs() < 1e-9,
                    "{t} has extra decimals"
                );
            }
        }
    }

    #[test]
    fn low_band_is_disjoint_from_normal() {
        // ---
        assert!(Band::Low.tenths().end() < Band::Normal.tenths().start());
        assert!(!Band::Normal.contains(14.9));
        assert!(!Band::Low.contains(14.9));
    }

    #[test]
    fn designation_is_one_percent_with_a_floor_of_one() {
        // ---
        let mut rng = StdRng::seed_from_u64(4);
        let fleet: Vec<i32> = (1..=10_000).collect();
        let picked = MalfunctionDesignation::select(&fleet, 0.01, &mut rng);
        assert_eq!(picked.len(), 100);

        let small: Vec<i32> = (1..=5).collect();
        let picked = MalfunctionDesignation::select(&small, 0.01, &mut rng);
        assert_eq!(picked.len(), 1);

        let picked = MalfunctionDesignation::select(&[], 0.01, &mut rng);
        assert!(picked.is_empty());
    }

    #[test]
    fn designation_only_names_fleet_members() {
        // ---
        let mut rng = StdRng::seed_from_u64(5);
        let fleet = [3, 8, 13, 21, 34];
        let picked = MalfunctionDesignation::select(&fleet, 0.5, &mut rng);
        assert_eq!(picked.len(), 2);
        assert!(picked.codes.iter().all(|c| fleet.contains(c)));
    }

    #[test]
    fn designation_is_reproducible_from_a_seed() {
        // ---
        let fleet: Vec<i32> = (1..=1_000).collect();
        let a = MalfunctionDesignation::select(&fleet, 0.01, &mut StdRng::seed_from_u64(9));
        let b = MalfunctionDesignation::select(&fleet, 0.01, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn tick_has_one_reading_per_sensor() {
        // ---
        let mut rng = StdRng::seed_from_u64(6);
        let sensors: Vec<i32> = (1..=250).collect();
        let designation = MalfunctionDesignation::from_codes([7, 70]);

        let batch = build_tick(&sensors, &designation, 1_700_000_123, &mut rng);

        assert_eq!(batch.len(), sensors.len());
        assert!(batch.iter().all(|r| r.timestamp == 1_700_000_123));
        let ids: HashSet<i32> = batch.iter().map(|r| r.sensor_id).collect();
        assert_eq!(ids.len(), sensors.len());

        for r in &batch {
            if designation.contains(r.sensor_id) {
                let t = r.temperature_value;
                assert!(Band::Low.contains(t) || Band::High.contains(t));
            } else {
                assert!(Band::Normal.contains(r.temperature_value));
            }
        }
    }

    #[test]
    fn empty_fleet_builds_an_empty_tick() {
        // ---
        let mut rng = StdRng::seed_from_u64(8);
        let batch = build_tick(&[], &MalfunctionDesignation::default(), 0, &mut rng);
        assert!(batch.is_empty());
    }
}
