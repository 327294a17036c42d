//! Anomaly Detector & Pruner.
//!
//! Two read paths and one write path over per-sensor mean temperatures:
//! - [`count_out_of_range`] counts a face's outliers without side effects.
//! - [`prune_face`] deletes the sensors that count would include; their
//!   readings disappear through the cascading foreign key.
//! - [`malfunctioning_by_deviation`] is a diagnostic report across all
//!   faces and never deletes anything.
//!
//! The sensors singled out here are unrelated to the generator's
//! [`MalfunctionDesignation`](crate::MalfunctionDesignation); they only
//! overlap because designated sensors tend to drift out of range.

use serde::Serialize;
use sqlx::PgPool;

use crate::{Face, FleetError, FleetResult, TimeWindow};

// ---

/// Inclusive band of acceptable per-sensor mean temperatures for a face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AllowedRange {
    pub min: f64,
    pub max: f64,
}

impl AllowedRange {
    // ---
    /// `average` ± `tolerance` (as a fraction of `average`).
    pub fn around(average: f64, tolerance: f64) -> FleetResult<Self> {
        // ---
        if !average.is_finite() {
            return Err(FleetError::InvalidParameter(format!(
                "face average must be finite, got {average}"
            )));
        }
        validate_fraction("tolerance", tolerance)?;

        let a = average * (1.0 - tolerance);
        let b = average * (1.0 + tolerance);
        Ok(Self {
            min: a.min(b),
            max: a.max(b),
        })
    }

    /// Strictly outside the band; values on either boundary are retained.
    pub fn excludes(&self, value: f64) -> bool {
        value < self.min || value > self.max
    }
}

/// A sensor whose mean strays from its face mean by more than the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SensorDeviation {
    // ---
    pub id: i32,
    pub sensor_code: i32,
    #[sqlx(try_from = "String")]
    pub face: Face,
    pub sensor_avg: f64,
    pub face_avg: f64,
    pub deviation: f64,
}

/// Relative deviation test used by the diagnostic report.
pub fn deviates(sensor_avg: f64, face_avg: f64, threshold: f64) -> bool {
    // ---
    face_avg != 0.0 && ((sensor_avg - face_avg).abs() / face_avg) > threshold
}

fn validate_fraction(name: &str, value: f64) -> FleetResult<()> {
    // ---
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(FleetError::InvalidParameter(format!(
            "{name} must be a non-negative fraction, got {value}"
        )))
    }
}

/// Count sensors on `face` whose all-time mean lies outside `range`.
///
/// Read-only; safe to call any number of times.
pub async fn count_out_of_range(
    pool: &PgPool,
    face: Face,
    range: AllowedRange,
) -> FleetResult<i64> {
    // ---
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM (
            SELECT s.sensor_code
            FROM sensors s
            JOIN sensor_data sd ON sd.sensor_id = s.sensor_code
            WHERE s.face = $1
            GROUP BY s.sensor_code
            HAVING AVG(sd.temperature_value) < $2
                OR AVG(sd.temperature_value) > $3
        ) AS sub
        "#,
    )
    .bind(face.as_str())
    .bind(range.min)
    .bind(range.max)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Delete every sensor on `face` whose all-time mean lies strictly outside
/// `range`. Returns the number of sensors removed.
pub async fn prune_face(pool: &PgPool, face: Face, range: AllowedRange) -> FleetResult<u64> {
    // ---
    let deleted = sqlx::query(
        r#"
        DELETE FROM sensors
        WHERE face = $1
          AND sensor_code IN (
            SELECT s.sensor_code
            FROM sensors s
            JOIN sensor_data sd ON sd.sensor_id = s.sensor_code
            WHERE s.face = $1
            GROUP BY s.sensor_code
            HAVING AVG(sd.temperature_value) < $2
                OR AVG(sd.temperature_value) > $3
          )
        "#,
    )
    .bind(face.as_str())
    .bind(range.min)
    .bind(range.max)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(deleted)
}

/// Report sensors whose mean deviates from their face mean by more than
/// `threshold` (a fraction, e.g. `0.2`). Both means are taken over `window`.
pub async fn malfunctioning_by_deviation(
    pool: &PgPool,
    threshold: f64,
    window: TimeWindow,
) -> FleetResult<Vec<SensorDeviation>> {
    // ---
    validate_fraction("threshold", threshold)?;

    let rows = sqlx::query_as::<_, SensorDeviation>(
        r#"
        WITH windowed AS (
            SELECT s.id, s.sensor_code, s.face, sd.temperature_value
            FROM sensor_data sd
            JOIN sensors s ON sd.sensor_id = s.sensor_code
            WHERE ($1::int8 IS NULL OR sd.timestamp >= $1)
              AND ($2::int8 IS NULL OR sd.timestamp <= $2)
        ),
        face_averages AS (
            SELECT face, AVG(temperature_value) AS face_avg
            FROM windowed
            GROUP BY face
        ),
        sensor_averages AS (
            SELECT id, sensor_code, face, AVG(temperature_value) AS sensor_avg
            FROM windowed
            GROUP BY id, sensor_code, face
        )
        SELECT sa.id,
               sa.sensor_code,
               sa.face::text AS face,
               sa.sensor_avg,
               fa.face_avg,
               ABS(sa.sensor_avg - fa.face_avg) / fa.face_avg AS deviation
        FROM sensor_averages sa
        JOIN face_averages fa ON sa.face = fa.face
        WHERE fa.face_avg <> 0
          AND ABS(sa.sensor_avg - fa.face_avg) / fa.face_avg > $3
        ORDER BY sa.sensor_code
        "#,
    )
    .bind(window.start)
    .bind(window.end)
    .bind(threshold)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
