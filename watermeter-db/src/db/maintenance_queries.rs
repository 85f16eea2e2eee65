use sqlx::postgres::PgConnection;
use time::OffsetDateTime;

use crate::{
    domain::{MaintenanceEvent, NewMaintenanceEvent},
    error::DbError,
};

// NUMERIC columns are cast to float8 so they decode into f64.
const SELECT_EVENT: &str = r#"
    SELECT
        id,
        time,
        meter_id,
        maintenance_type,
        description,
        quantity::float8 AS quantity,
        unit,
        cost::float8     AS cost,
        notes,
        created_by
    FROM maintenance_log
"#;

/// Insert an event stamped with `time` and return the stored row.
pub async fn insert_maintenance_event(
    conn: &mut PgConnection,
    event: &NewMaintenanceEvent,
    time: OffsetDateTime,
) -> Result<MaintenanceEvent, DbError> {
    let row = sqlx::query_as::<_, MaintenanceEvent>(
        r#"
        INSERT INTO maintenance_log (
            time, meter_id, maintenance_type, description,
            quantity, unit, cost, notes, created_by
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING
            id,
            time,
            meter_id,
            maintenance_type,
            description,
            quantity::float8 AS quantity,
            unit,
            cost::float8     AS cost,
            notes,
            created_by
        "#,
    )
    .bind(time)
    .bind(&event.meter_id)
    .bind(&event.maintenance_type)
    .bind(&event.description)
    .bind(event.quantity)
    .bind(&event.unit)
    .bind(event.cost)
    .bind(&event.notes)
    .bind(&event.created_by)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row)
}

/// Events for a meter within the last `days` days, newest first.
pub async fn recent_maintenance(
    conn: &mut PgConnection,
    meter_id: &str,
    days: i32,
) -> Result<Vec<MaintenanceEvent>, DbError> {
    let sql = format!(
        "{SELECT_EVENT} WHERE meter_id = $1 AND time >= NOW() - make_interval(days => $2) ORDER BY time DESC"
    );
    let rows = sqlx::query_as::<_, MaintenanceEvent>(&sql)
        .bind(meter_id)
        .bind(days)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows)
}

/// Latest event of the given type, if any.
pub async fn last_maintenance_of_type(
    conn: &mut PgConnection,
    meter_id: &str,
    maintenance_type: &str,
) -> Result<Option<MaintenanceEvent>, DbError> {
    let sql = format!(
        "{SELECT_EVENT} WHERE meter_id = $1 AND maintenance_type = $2 ORDER BY time DESC LIMIT 1"
    );
    let row = sqlx::query_as::<_, MaintenanceEvent>(&sql)
        .bind(meter_id)
        .bind(maintenance_type)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row)
}

/// Latest event of any type, if any.
pub async fn last_maintenance(
    conn: &mut PgConnection,
    meter_id: &str,
) -> Result<Option<MaintenanceEvent>, DbError> {
    let sql = format!("{SELECT_EVENT} WHERE meter_id = $1 ORDER BY time DESC LIMIT 1");
    let row = sqlx::query_as::<_, MaintenanceEvent>(&sql)
        .bind(meter_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row)
}
