use std::sync::Arc;
use thiserror::Error;

/// Errors from the connection layer.
///
/// Cloneable so that one establishment failure can be handed to every
/// caller that was waiting on the same attempt.
#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0} is not set; configure the base MongoDB connection string")]
    ConfigurationMissing(&'static str),

    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),

    #[error("Invalid tenant key: {0:?}")]
    InvalidTenantKey(String),

    #[error("Connection for '{key}' timed out after {after_ms}ms")]
    ConnectionTimeout { key: String, after_ms: u64 },

    #[error("Connection for '{key}' failed: {message}")]
    ConnectionFailed { key: String, message: String },

    #[error("Connection for '{0}' is not ready")]
    NotReady(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Driver error: {0}")]
    Driver(Arc<mongodb::error::Error>),
}

impl From<mongodb::error::Error> for DatabaseError {
    fn from(err: mongodb::error::Error) -> Self {
        DatabaseError::Driver(Arc::new(err))
    }
}

impl DatabaseError {
    /// Failures that reset the cache entry and may succeed on the next call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionTimeout { .. }
                | DatabaseError::ConnectionFailed { .. }
                | DatabaseError::Driver(_)
        )
    }
}
