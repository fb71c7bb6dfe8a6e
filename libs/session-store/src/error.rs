//! Custom error types for the session store

use axum::http::header::InvalidHeaderValue;
use common::error::DatabaseError;
use thiserror::Error;

/// Errors produced by the session store
///
/// `InvalidCookie` and `Corrupt` never leave [`crate::SessionStore::get`]; they
/// are downgraded to a fresh session there. The remaining variants are
/// surfaced to the caller.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The cookie value failed authentication or could not be parsed
    #[error("Invalid session cookie")]
    InvalidCookie,

    /// The persisted payload could not be decoded
    #[error("Corrupt session payload: {0}")]
    Corrupt(#[source] serde_json::Error),

    /// The encoded payload is larger than the configured maximum
    #[error("Session payload is {size} bytes, exceeding the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    /// The payload could not be serialized
    #[error("Failed to encode session payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// The outgoing cookie could not be rendered as a header value
    #[error("Invalid Set-Cookie header: {0}")]
    Header(#[from] InvalidHeaderValue),

    /// Backing store failure
    #[error("Session backend error: {0}")]
    Backend(#[from] DatabaseError),

    /// Invalid keys or options given at construction
    #[error("Session store configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with SessionError
pub type SessionResult<T> = Result<T, SessionError>;
