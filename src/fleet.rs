//! Fleet Maintainer: keeps the registry populated with codes `1..=target`.

use std::collections::HashSet;

use rand::{seq::SliceRandom, Rng};
use sqlx::PgPool;

use crate::{store, Face, FleetResult, NewSensor};

// ---

/// Codes in `1..=target` that are absent from `existing`, ascending.
pub fn missing_codes(existing: &[i32], target: i32) -> Vec<i32> {
    // ---
    let present: HashSet<i32> = existing.iter().copied().collect();
    (1..=target).filter(|code| !present.contains(code)).collect()
}

/// Build one `active` sensor per code, each on a uniformly random face.
pub fn plan_sensors<R: Rng + ?Sized>(
    codes: &[i32],
    installed_at: i64,
    rng: &mut R,
) -> Vec<NewSensor> {
    // ---
    codes
        .iter()
        .map(|&code| {
            let face = *Face::ALL.choose(rng).unwrap_or(&Face::North);
            NewSensor::active(code, face, installed_at)
        })
        .collect()
}

/// Ensure every code in `1..=target` is registered.
///
/// No-op when the registry already holds at least `target` distinct codes.
/// Otherwise all missing sensors are inserted in one transaction, so either
/// the whole gap is filled or nothing changes. Returns the number created.
pub async fn ensure_fleet<R: Rng + ?Sized>(
    pool: &PgPool,
    target: i32,
    rng: &mut R,
) -> FleetResult<u64> {
    // ---
    let current = store::count_sensors(pool).await?;
    if current >= i64::from(target) {
        return Ok(0);
    }

    let existing = store::list_codes(pool).await?;
    let missing = missing_codes(&existing, target);
    if missing.is_empty() {
        return Ok(0);
    }

    tracing::info!(
        missing = missing.len(),
        target,
        "Generating missing sensors in one batch"
    );

    let installed_at = chrono::Utc::now().timestamp();
    let batch = plan_sensors(&missing, installed_at, rng);
    let created = store::insert_sensors(pool, &batch).await?;

    tracing::info!(created, target, "Sensor generation complete");
    Ok(created)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn empty_registry_needs_every_code() {
        // ---
        assert_eq!(missing_codes(&[], 5), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn gaps_are_found_regardless_of_order() {
        // ---
        assert_eq!(missing_codes(&[5, 1, 3], 5), vec![2, 4]);
        assert!(missing_codes(&[1, 2, 3], 3).is_empty());
    }

    #[test]
    fn codes_beyond_target_do_not_count() {
        // ---
        assert_eq!(missing_codes(&[1, 99], 3), vec![2, 3]);
        assert!(missing_codes(&[1, 2], 0).is_empty());
    }

    #[test]
    fn planned_sensors_are_active_and_cover_the_codes() {
        // ---
        let mut rng = StdRng::seed_from_u64(7);
        let plan = plan_sensors(&[2, 4, 9], 1_700_000_000, &mut rng);

        let codes: Vec<i32> = plan.iter().map(|s| s.sensor_code).collect();
        assert_eq!(codes, vec![2, 4, 9]);
        assert!(plan.iter().all(|s| s.status == "active"));
        assert!(plan.iter().all(|s| s.installed_at == 1_700_000_000));
    }

    #[test]
    fn planned_faces_use_every_orientation() {
        // ---
        let mut rng = StdRng::seed_from_u64(11);
        let codes: Vec<i32> = (1..=400).collect();
        let faces: HashSet<Face> = plan_sensors(&codes, 0, &mut rng)
            .into_iter()
            .map(|s| s.face)
            .collect();
        assert_eq!(faces.len(), Face::ALL.len());
    }
}
