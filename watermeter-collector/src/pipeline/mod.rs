use watermeter_db::{domain::Reading, DbError};

/// Everything that can go wrong inside a poll cycle.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("fetch error: {0}")]
    Fetch(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl PipelineError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Fetch(_) => "fetch",
            Self::Validation(_) => "validation",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<DbError> for PipelineError {
    fn from(e: DbError) -> Self {
        if e.is_connection_error() {
            Self::Connection(e.to_string())
        } else {
            Self::Storage(e.to_string())
        }
    }
}

/// Produces one reading per call.
#[async_trait::async_trait]
pub trait Source: Send + Sync {
    async fn fetch(&self) -> Result<Reading, PipelineError>;
}

/// Owns the storage connection for the lifetime of the daemon.
#[async_trait::async_trait]
pub trait Sink: Send {
    /// Cheap liveness probe; false means the caller should reconnect.
    async fn health_check(&mut self) -> bool;

    async fn reconnect(&mut self) -> Result<(), PipelineError>;

    async fn write(&mut self, reading: &Reading) -> Result<(), PipelineError>;

    /// Release the connection. Called exactly once, on every exit path.
    async fn close(&mut self);
}
