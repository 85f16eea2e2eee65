use sqlx::error::DatabaseError;

/// SQLSTATE raised when the target database does not exist.
const INVALID_CATALOG_NAME: &str = "3D000";

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error("failed to connect to database {database:?}: {source}")]
    Connect {
        database: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to create database {database:?}: {source}")]
    CreateDatabase {
        database: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("unique key violation: {0}")]
    Duplicate(#[source] sqlx::Error),
    #[error("database connection lost: {0}")]
    ConnectionLost(#[source] sqlx::Error),
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),
}

impl DbError {
    /// True when the failure means the connection itself is unusable.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::ConnectionLost(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return Self::Duplicate(e);
            }
        }
        if is_connection_failure(&e) {
            Self::ConnectionLost(e)
        } else {
            Self::Query(e)
        }
    }
}

/// Transport-level failures plus the server-side "connection exception" (08xxx)
/// and operator-intervention shutdown codes.
pub fn is_connection_failure(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => sqlstate(&**db)
            .map(|code| code.starts_with("08") || matches!(code.as_str(), "57P01" | "57P02" | "57P03"))
            .unwrap_or(false),
        _ => false,
    }
}

pub fn is_missing_database(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => sqlstate(&**db).as_deref() == Some(INVALID_CATALOG_NAME),
        _ => false,
    }
}

fn sqlstate(db: &dyn DatabaseError) -> Option<String> {
    db.code().map(|c| c.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn io_errors_are_connection_failures() {
        let err = DbError::from(sqlx::Error::Io(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")));
        assert!(matches!(err, DbError::ConnectionLost(_)));
        assert!(err.is_connection_error());
    }

    #[test]
    fn closed_pool_is_a_connection_failure() {
        assert!(matches!(DbError::from(sqlx::Error::PoolClosed), DbError::ConnectionLost(_)));
    }

    #[test]
    fn other_errors_are_query_failures() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DbError::Query(_)));
        assert!(!err.is_connection_error());
        assert!(!is_missing_database(&sqlx::Error::RowNotFound));
    }
}
