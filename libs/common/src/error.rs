//! Error types shared by the storage layers
//!
//! Every backend call made by the session store funnels its failure through
//! [`DatabaseError`], so callers see one error shape regardless of whether the
//! rows live in PostgreSQL or SQLite.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The pool could not be created or a connection could not be acquired
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// A statement failed while running against the backend
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// The session table or its index could not be created
    #[error("Database migration error for table {table}: {source}")]
    Migration {
        table: String,
        #[source]
        source: SqlxError,
    },

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl From<SqlxError> for DatabaseError {
    fn from(err: SqlxError) -> Self {
        match err {
            SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) => {
                DatabaseError::Connection(err)
            }
            other => DatabaseError::Query(other),
        }
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;
