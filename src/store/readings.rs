//! Reading Store: the append-only log of temperature observations.

use sqlx::PgPool;

use crate::{FleetResult, NewReading, Reading};

// ---

/// Append a tick's readings as one atomic batch. Returns the number inserted.
///
/// Either every reading commits or none does; a reading for a sensor that
/// vanished in the meantime fails the foreign key and rolls back the batch.
pub async fn insert_readings(pool: &PgPool, readings: &[NewReading]) -> FleetResult<u64> {
    // ---
    if readings.is_empty() {
        return Ok(0);
    }

    let sensor_ids: Vec<i32> = readings.iter().map(|r| r.sensor_id).collect();
    let timestamps: Vec<i64> = readings.iter().map(|r| r.timestamp).collect();
    let values: Vec<f64> = readings.iter().map(|r| r.temperature_value).collect();

    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO sensor_data (sensor_id, timestamp, temperature_value)
        SELECT * FROM UNNEST($1::int4[], $2::int8[], $3::float8[])
        "#,
    )
    .bind(&sensor_ids)
    .bind(&timestamps)
    .bind(&values)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;
    Ok(inserted)
}

/// Readings for one sensor code, newest first.
pub async fn readings_by_sensor(
    pool: &PgPool,
    sensor_code: i32,
    limit: i64,
    offset: i64,
) -> FleetResult<Vec<Reading>> {
    // ---
    let readings = sqlx::query_as::<_, Reading>(
        r#"
        SELECT id, sensor_id, timestamp, temperature_value
        FROM sensor_data
        WHERE sensor_id = $1
        ORDER BY timestamp DESC, id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(sensor_code)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(readings)
}

pub async fn latest_reading(pool: &PgPool, sensor_code: i32) -> FleetResult<Option<Reading>> {
    // ---
    let reading = sqlx::query_as::<_, Reading>(
        r#"
        SELECT id, sensor_id, timestamp, temperature_value
        FROM sensor_data
        WHERE sensor_id = $1
        ORDER BY timestamp DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(sensor_code)
    .fetch_optional(pool)
    .await?;
    Ok(reading)
}
