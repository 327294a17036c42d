//! Aggregator: per-face mean temperature over a trailing window.
//!
//! Readings are grouped by a coarse time [`Bucket`] and by the owning
//! sensor's face. [`overall_face_average`] then averages the bucket means
//! again, weighting every bucket equally regardless of how many readings
//! fell into it (a mean of means, not a mean of raw readings).

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::{Face, FleetError, FleetResult, TimeWindow};

// ---

/// Time-grouping granularity passed to Postgres `date_trunc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl Bucket {
    // ---
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Minute => "minute",
            Bucket::Hour => "hour",
            Bucket::Day => "day",
            Bucket::Week => "week",
            Bucket::Month => "month",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minute" => Ok(Bucket::Minute),
            "hour" => Ok(Bucket::Hour),
            "day" => Ok(Bucket::Day),
            "week" => Ok(Bucket::Week),
            "month" => Ok(Bucket::Month),
            other => Err(FleetError::InvalidBucket(other.to_string())),
        }
    }
}

/// Mean temperature of one face within one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct FaceBucketAverage {
    // ---
    pub period: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub face: Face,
    pub avg_temperature: f64,
}

/// One point of a single-face series from [`face_series`].
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct BucketAverage {
    pub period: DateTime<Utc>,
    pub avg_temperature: f64,
}

/// Mean temperature per (bucket, face) for readings inside `window`,
/// ordered by bucket then face.
pub async fn facewise_average(
    pool: &PgPool,
    bucket: Bucket,
    window: TimeWindow,
) -> FleetResult<Vec<FaceBucketAverage>> {
    // ---
    let rows = sqlx::query_as::<_, FaceBucketAverage>(
        r#"
        SELECT date_trunc($1, to_timestamp(sd.timestamp)) AS period,
               s.face::text                               AS face,
               AVG(sd.temperature_value)                  AS avg_temperature
        FROM sensor_data sd
        JOIN sensors s ON sd.sensor_id = s.sensor_code
        WHERE ($2::int8 IS NULL OR sd.timestamp >= $2)
          AND ($3::int8 IS NULL OR sd.timestamp <= $3)
        GROUP BY 1, 2
        ORDER BY 1, 2
        "#,
    )
    .bind(bucket.as_str())
    .bind(window.start)
    .bind(window.end)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Collapse per-bucket means into one mean per face, each bucket weighted equally.
pub fn mean_of_bucket_means(rows: &[FaceBucketAverage]) -> BTreeMap<Face, f64> {
    // ---
    let mut sums: BTreeMap<Face, (f64, u32)> = BTreeMap::new();
    for row in rows {
        let entry = sums.entry(row.face).or_insert((0.0, 0));
        entry.0 += row.avg_temperature;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(face, (total, count))| (face, total / f64::from(count)))
        .collect()
}

/// One scalar mean per face over `window`. Faces without readings are absent.
pub async fn overall_face_average(
    pool: &PgPool,
    bucket: Bucket,
    window: TimeWindow,
) -> FleetResult<BTreeMap<Face, f64>> {
    // ---
    let rows = facewise_average(pool, bucket, window).await?;
    Ok(mean_of_bucket_means(&rows))
}

/// Bucketed mean temperature series for a single face, ordered by bucket.
pub async fn face_series(
    pool: &PgPool,
    face: Face,
    bucket: Bucket,
    window: TimeWindow,
) -> FleetResult<Vec<BucketAverage>> {
    // ---
    let rows = sqlx::query_as::<_, BucketAverage>(
        r#"
        SELECT date_trunc($1, to_timestamp(sd.timestamp)) AS period,
               AVG(sd.temperature_value)                  AS avg_temperature
        FROM sensor_data sd
        JOIN sensors s ON sd.sensor_id = s.sensor_code
        WHERE s.face = $2
          AND ($3::int8 IS NULL OR sd.timestamp >= $3)
          AND ($4::int8 IS NULL OR sd.timestamp <= $4)
        GROUP BY 1
        ORDER BY 1
        "#,
    )
    .bind(bucket.as_str())
    .bind(face.as_str())
    .bind(window.start)
    .bind(window.end)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn row(minute: u32, face: Face, avg: f64) -> FaceBucketAverage {
        // ---
        FaceBucketAverage {
            period: Utc.with_ymd_and_hms(2025, 3, 26, 18, minute, 0).unwrap(),
            face,
            avg_temperature: avg,
        }
    }

    #[test]
    fn every_allowed_bucket_parses() {
        // ---
        for name in ["minute", "hour", "day", "week", "month"] {
            let bucket: Bucket = name.parse().unwrap();
            assert_eq!(bucket.as_str(), name);
        }
    }

    #[test]
    fn unknown_bucket_is_a_usage_error() {
        // ---
        for bad in ["second", "year", "Minute", ""] {
            let err = bad.parse::<Bucket>().unwrap_err();
            assert!(matches!(err, FleetError::InvalidBucket(ref s) if s == bad));
        }
    }

    #[test]
    fn buckets_are_weighted_equally() {
        // ---
        // Bucket 0 stands in for 1000 readings averaging 20.0, bucket 1 for a
        // single reading of 30.0; the raw mean would sit near 20.01.
        let rows = vec![row(0, Face::North, 20.0), row(1, Face::North, 30.0)];
        let overall = mean_of_bucket_means(&rows);
        assert_eq!(overall[&Face::North], 25.0);
    }

    #[test]
    fn faces_are_averaged_independently() {
        // ---
        let rows = vec![
            row(0, Face::East, 18.0),
            row(0, Face::West, 22.0),
            row(1, Face::East, 20.0),
            row(1, Face::West, 26.0),
            row(2, Face::West, 27.0),
        ];
        let overall = mean_of_bucket_means(&rows);
        assert_eq!(overall.len(), 2);
        assert_eq!(overall[&Face::East], 19.0);
        assert_eq!(overall[&Face::West], 25.0);
        assert!(!overall.contains_key(&Face::North));
    }

    #[test]
    fn no_rows_means_no_faces() {
        // ---
        assert!(mean_of_bucket_means(&[]).is_empty());
    }
}
