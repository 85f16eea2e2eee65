use std::fmt;

use sqlx::{
    postgres::{PgConnectOptions, PgConnection},
    Connection,
};

use crate::error::{is_missing_database, DbError};

/// Maintenance database used to issue `CREATE DATABASE`.
pub const ADMIN_DATABASE: &str = "postgres";

/// SQLSTATE for `duplicate_database`, raised when another client won the race to create it.
const DUPLICATE_DATABASE: &str = "42P04";

#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl ConnectionSettings {
    pub fn connect_options(&self) -> PgConnectOptions {
        self.connect_options_for(&self.database)
    }

    fn connect_options_for(&self, database: &str) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(database)
    }
}

/// Quote `name` as a Postgres identifier: wrap it in double quotes and double any
/// embedded quote. `CREATE DATABASE` cannot take a bind parameter, so this is the
/// only form in which a configured name may reach SQL text.
pub fn quote_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Open a connection to the configured database.
pub async fn connect(settings: &ConnectionSettings) -> Result<PgConnection, DbError> {
    PgConnection::connect_with(&settings.connect_options())
        .await
        .map_err(|source| DbError::Connect {
            database: settings.database.clone(),
            source,
        })
}

/// Open a connection to the configured database, creating the database first if
/// the server reports that it does not exist.
pub async fn connect_or_create(settings: &ConnectionSettings) -> Result<PgConnection, DbError> {
    match PgConnection::connect_with(&settings.connect_options()).await {
        Ok(conn) => {
            tracing::info!(database = %settings.database, "connected to existing database");
            Ok(conn)
        }
        Err(e) if is_missing_database(&e) => {
            tracing::info!(database = %settings.database, "database does not exist, creating it");
            create_database(settings).await?;
            let conn = connect(settings).await?;
            tracing::info!(database = %settings.database, "connected to newly created database");
            Ok(conn)
        }
        Err(source) => Err(DbError::Connect {
            database: settings.database.clone(),
            source,
        }),
    }
}

async fn create_database(settings: &ConnectionSettings) -> Result<(), DbError> {
    let mut admin = PgConnection::connect_with(&settings.connect_options_for(ADMIN_DATABASE))
        .await
        .map_err(|source| DbError::Connect {
            database: ADMIN_DATABASE.to_string(),
            source,
        })?;

    let statement = format!("CREATE DATABASE {}", quote_identifier(&settings.database));
    let result = sqlx::raw_sql(&statement).execute(&mut admin).await;
    close(admin).await;

    match result {
        Ok(_) => {
            tracing::info!(database = %settings.database, "database created");
            Ok(())
        }
        Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(DUPLICATE_DATABASE) => {
            tracing::info!(database = %settings.database, "database was created concurrently");
            Ok(())
        }
        Err(source) => Err(DbError::CreateDatabase {
            database: settings.database.clone(),
            source,
        }),
    }
}

/// Round-trip a trivial query. Never fails; callers decide whether to reconnect.
pub async fn health_check(conn: &mut PgConnection) -> bool {
    match sqlx::query("SELECT 1").execute(&mut *conn).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "database health check failed");
            false
        }
    }
}

/// Close a connection, logging instead of failing if the server is already gone.
pub async fn close(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        tracing::debug!(error = %e, "error while closing database connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_identifier_wraps_plain_names() {
        assert_eq!(quote_identifier("watermeter"), "\"watermeter\"");
    }

    #[test]
    fn quote_identifier_doubles_embedded_quotes() {
        assert_eq!(
            quote_identifier("meter\"; DROP DATABASE postgres; --"),
            "\"meter\"\"; DROP DATABASE postgres; --\""
        );
    }

    #[test]
    fn debug_output_redacts_password() {
        let settings = ConnectionSettings {
            host: "localhost".to_string(),
            port: 5432,
            database: "watermeter".to_string(),
            user: "meter".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
