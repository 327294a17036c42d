//! Database schema management for `sensorfleet`.
//!
//! The worker never creates tables itself: `create_schema` is only called by
//! the `sensorfleet-migrate` binary, and the worker checks `registry_exists`
//! during bootstrap and aborts when it reports `false`.

use sqlx::PgPool;

use crate::FleetResult;

// ---

/// Create the `sensors` and `sensor_data` relations (idempotent).
///
/// Readings reference the sensor's external `sensor_code` with a cascading
/// foreign key, so deleting a sensor removes all of its readings. Safe to
/// call on every deploy; no-op if objects already exist.
pub async fn create_schema(pool: &PgPool) -> FleetResult<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensors (
            id           SERIAL PRIMARY KEY,
            sensor_code  INTEGER     UNIQUE NOT NULL,
            face         VARCHAR(10) NOT NULL,
            installed_at BIGINT      NOT NULL,
            status       VARCHAR(20) NOT NULL DEFAULT 'active'
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_data (
            id                SERIAL PRIMARY KEY,
            sensor_id         INTEGER          NOT NULL
                REFERENCES sensors (sensor_code) ON DELETE CASCADE,
            timestamp         BIGINT           NOT NULL,
            temperature_value DOUBLE PRECISION NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Aggregation and pruning both join on sensor_id and filter by face/time
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_data_sensor_id
            ON sensor_data (sensor_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_data_timestamp
            ON sensor_data (timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensors_face
            ON sensors (face);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Report whether the `sensors` relation resolves in the current search path.
pub async fn registry_exists(pool: &PgPool) -> FleetResult<bool> {
    // ---
    let exists: bool = sqlx::query_scalar("SELECT to_regclass('sensors') IS NOT NULL")
        .fetch_one(pool)
        .await?;
    Ok(exists)
}
