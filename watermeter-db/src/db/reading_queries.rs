use sqlx::postgres::PgConnection;

use crate::{domain::Reading, error::DbError};

/// Insert one reading. A second reading for the same second and meter fails with
/// [`DbError::Duplicate`].
pub async fn insert_reading(conn: &mut PgConnection, reading: &Reading) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO water_readings (
            time, meter_id, total_liter_m3, active_liter_lpm,
            wifi_strength, wifi_ssid, total_liter_offset_m3
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(reading.time)
    .bind(&reading.meter_id)
    .bind(reading.total_liter_m3)
    .bind(reading.active_liter_lpm)
    .bind(reading.wifi_strength)
    .bind(&reading.wifi_ssid)
    .bind(reading.total_liter_offset_m3)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Most recent readings for a meter, newest first.
pub async fn recent_readings(
    conn: &mut PgConnection,
    meter_id: &str,
    limit: i64,
) -> Result<Vec<Reading>, DbError> {
    let rows = sqlx::query_as::<_, Reading>(
        r#"
        SELECT
            time,
            meter_id,
            total_liter_m3::float8        AS total_liter_m3,
            active_liter_lpm::float8      AS active_liter_lpm,
            wifi_strength,
            wifi_ssid,
            total_liter_offset_m3::float8 AS total_liter_offset_m3
        FROM water_readings
        WHERE meter_id = $1
        ORDER BY time DESC
        LIMIT $2
        "#,
    )
    .bind(meter_id)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}
