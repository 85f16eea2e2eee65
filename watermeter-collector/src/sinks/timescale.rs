use sqlx::postgres::PgConnection;
use watermeter_db::{
    db::{self, ConnectionSettings},
    domain::Reading,
    DbError,
};

use crate::pipeline::{PipelineError, Sink};

/// Writes readings to `water_readings` over a single owned connection.
pub struct TimescaleSink {
    settings: ConnectionSettings,
    conn: Option<PgConnection>,
}

impl TimescaleSink {
    /// Connect (creating the database if needed) and make sure the schema exists.
    pub async fn open(settings: ConnectionSettings) -> Result<Self, DbError> {
        let mut conn = db::connect_or_create(&settings).await?;
        if let Err(e) = db::ensure_schema(&mut conn).await {
            db::close(conn).await;
            return Err(e);
        }

        Ok(Self {
            settings,
            conn: Some(conn),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }
}

#[async_trait::async_trait]
impl Sink for TimescaleSink {
    async fn health_check(&mut self) -> bool {
        match self.conn.as_mut() {
            Some(conn) => db::health_check(conn).await,
            None => false,
        }
    }

    async fn reconnect(&mut self) -> Result<(), PipelineError> {
        if let Some(stale) = self.conn.take() {
            db::close(stale).await;
        }
        metrics::counter!("storage_reconnects_total").increment(1);

        let conn = db::connect(&self.settings).await?;
        tracing::info!(database = %self.settings.database, "reconnected to database");
        self.conn = Some(conn);
        Ok(())
    }

    async fn write(&mut self, reading: &Reading) -> Result<(), PipelineError> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| PipelineError::Connection("no open database connection".to_string()))?;

        db::insert_reading(conn, reading).await?;

        metrics::counter!("readings_stored_total").increment(1);
        tracing::info!(
            meter_id = %reading.meter_id,
            total_liter_m3 = reading.total_liter_m3,
            active_liter_lpm = reading.active_liter_lpm,
            "stored reading"
        );
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            db::close(conn).await;
            tracing::info!("database connection closed");
        }
    }
}
