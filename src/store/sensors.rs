//! Sensor Registry: the durable set of sensor identities.

use sqlx::PgPool;

use crate::{FleetResult, NewSensor, Sensor};

// ---

/// Number of distinct sensor codes currently registered.
pub async fn count_sensors(pool: &PgPool) -> FleetResult<i64> {
    // ---
    let count: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT sensor_code) FROM sensors")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// All registered sensor codes, ascending.
pub async fn list_codes(pool: &PgPool) -> FleetResult<Vec<i32>> {
    // ---
    let codes: Vec<i32> =
        sqlx::query_scalar("SELECT sensor_code FROM sensors ORDER BY sensor_code ASC")
            .fetch_all(pool)
            .await?;
    Ok(codes)
}

/// Insert a batch of sensors as one atomic unit.
///
/// Codes that were registered concurrently by another writer are skipped
/// rather than failing the batch. Returns the number of rows inserted.
pub async fn insert_sensors(pool: &PgPool, sensors: &[NewSensor]) -> FleetResult<u64> {
    // ---
    if sensors.is_empty() {
        return Ok(0);
    }

    let codes: Vec<i32> = sensors.iter().map(|s| s.sensor_code).collect();
    let faces: Vec<&str> = sensors.iter().map(|s| s.face.as_str()).collect();
    let installed: Vec<i64> = sensors.iter().map(|s| s.installed_at).collect();
    let statuses: Vec<&str> = sensors.iter().map(|s| s.status.as_str()).collect();

    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO sensors (sensor_code, face, installed_at, status)
        SELECT * FROM UNNEST($1::int4[], $2::text[], $3::int8[], $4::text[])
        ON CONFLICT (sensor_code) DO NOTHING
        "#,
    )
    .bind(&codes)
    .bind(&faces)
    .bind(&installed)
    .bind(&statuses)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;
    Ok(inserted)
}

pub async fn list_sensors(pool: &PgPool) -> FleetResult<Vec<Sensor>> {
    // ---
    let sensors = sqlx::query_as::<_, Sensor>(
        "SELECT id, sensor_code, face, installed_at, status FROM sensors ORDER BY sensor_code",
    )
    .fetch_all(pool)
    .await?;
    Ok(sensors)
}

/// Look up a sensor by its surrogate key.
pub async fn get_sensor(pool: &PgPool, id: i32) -> FleetResult<Option<Sensor>> {
    // ---
    let sensor = sqlx::query_as::<_, Sensor>(
        "SELECT id, sensor_code, face, installed_at, status FROM sensors WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(sensor)
}

/// Register a single sensor, returning its store-assigned id.
pub async fn create_sensor(pool: &PgPool, sensor: &NewSensor) -> FleetResult<i32> {
    // ---
    let id: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO sensors (sensor_code, face, installed_at, status)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(sensor.sensor_code)
    .bind(sensor.face.as_str())
    .bind(sensor.installed_at)
    .bind(&sensor.status)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Overwrite every mutable field of sensor `id`. Returns `false` if no such sensor.
pub async fn update_sensor(pool: &PgPool, id: i32, sensor: &NewSensor) -> FleetResult<bool> {
    // ---
    let updated = sqlx::query(
        r#"
        UPDATE sensors
        SET sensor_code = $1, face = $2, installed_at = $3, status = $4
        WHERE id = $5
        "#,
    )
    .bind(sensor.sensor_code)
    .bind(sensor.face.as_str())
    .bind(sensor.installed_at)
    .bind(&sensor.status)
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(updated > 0)
}

/// Delete sensor `id`; its readings go with it via the cascading foreign key.
pub async fn delete_sensor(pool: &PgPool, id: i32) -> FleetResult<bool> {
    // ---
    let deleted = sqlx::query("DELETE FROM sensors WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}
