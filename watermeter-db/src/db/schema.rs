use sqlx::postgres::PgConnection;

use crate::error::DbError;

const CREATE_WATER_READINGS: &str = r#"
    CREATE TABLE IF NOT EXISTS water_readings (
        time                  TIMESTAMPTZ    NOT NULL,
        meter_id              TEXT           NOT NULL,
        total_liter_m3        NUMERIC(12,3)  NOT NULL,
        active_liter_lpm      NUMERIC(8,3)   NOT NULL,
        wifi_strength         INTEGER        NOT NULL,
        wifi_ssid             TEXT,
        total_liter_offset_m3 NUMERIC(12,3),
        PRIMARY KEY (time, meter_id)
    )
"#;

const CREATE_MAINTENANCE_LOG: &str = r#"
    CREATE TABLE IF NOT EXISTS maintenance_log (
        id               SERIAL,
        time             TIMESTAMPTZ NOT NULL,
        meter_id         TEXT        NOT NULL,
        maintenance_type TEXT        NOT NULL,
        description      TEXT,
        quantity         NUMERIC(10,3),
        unit             TEXT,
        cost             NUMERIC(10,2),
        notes            TEXT,
        created_by       TEXT DEFAULT 'system',
        PRIMARY KEY (time, id)
    )
"#;

const CREATE_INDEXES: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS idx_water_readings_meter_time ON water_readings (meter_id, time DESC)",
    "CREATE INDEX IF NOT EXISTS idx_maintenance_log_meter_time ON maintenance_log (meter_id, time DESC)",
    "CREATE INDEX IF NOT EXISTS idx_maintenance_log_type ON maintenance_log (meter_id, maintenance_type, time DESC)",
];

/// Tables converted into hypertables partitioned on `time`.
pub const HYPERTABLES: [&str; 2] = ["water_readings", "maintenance_log"];

/// Create tables, hypertables and indexes if they are missing. Safe to call on
/// every start.
pub async fn ensure_schema(conn: &mut PgConnection) -> Result<(), DbError> {
    sqlx::query(CREATE_WATER_READINGS).execute(&mut *conn).await?;
    sqlx::query(CREATE_MAINTENANCE_LOG).execute(&mut *conn).await?;

    if enable_timescaledb(conn).await? {
        for table in HYPERTABLES {
            // if_not_exists turns "already a hypertable" into a notice.
            sqlx::query("SELECT create_hypertable($1::regclass, 'time', if_not_exists => TRUE, migrate_data => TRUE)")
                .bind(table)
                .execute(&mut *conn)
                .await?;
            tracing::debug!(table, "hypertable ensured");
        }
    }

    for statement in CREATE_INDEXES {
        sqlx::query(statement).execute(&mut *conn).await?;
    }

    tracing::info!("database schema ready (water_readings, maintenance_log)");
    Ok(())
}

/// Returns whether the timescaledb extension is installed after this call.
async fn enable_timescaledb(conn: &mut PgConnection) -> Result<bool, DbError> {
    let available: Option<i32> =
        sqlx::query_scalar("SELECT 1 FROM pg_available_extensions WHERE name = 'timescaledb'")
            .fetch_optional(&mut *conn)
            .await?;
    if available.is_none() {
        tracing::warn!("timescaledb extension is not available, keeping plain tables");
        return Ok(false);
    }

    match sqlx::query("CREATE EXTENSION IF NOT EXISTS timescaledb").execute(&mut *conn).await {
        Ok(_) => Ok(true),
        Err(e) => {
            let err = DbError::from(e);
            if err.is_connection_error() {
                return Err(err);
            }
            tracing::warn!(error = %err, "could not enable timescaledb, keeping plain tables");
            Ok(false)
        }
    }
}
