//! Crate-level error types
//!
//! Repository operations return [`RepositoryError`] directly. [`Error`] covers
//! everything around them: configuration, tracing setup, connection pools, and
//! wraps repository failures so applications can use a single `Result`.

use thiserror::Error;

use crate::repository::RepositoryError;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Repository operation failed
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// Database error (connection pool setup)
    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tracing subscriber could not be installed
    #[error("Tracing error: {0}")]
    Tracing(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// Manual From implementations for boxed errors
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl Error {
    /// The repository error, if this wraps one
    pub fn as_repository(&self) -> Option<&RepositoryError> {
        match self {
            Error::Repository(err) => Some(err),
            _ => None,
        }
    }
}
