//! Server-side sessions addressed by signed cookies
//!
//! The browser only ever holds an HMAC-signed, optionally encrypted, session
//! identifier. The session payload lives in a relational table (PostgreSQL,
//! MySQL or SQLite) together with
//! its expiry, and expired rows are swept on demand or by a background task.
//!
//! ```rust,no_run
//! use axum::http::HeaderMap;
//! use common::database::{DatabaseConfig, init_sqlite_pool};
//! use session_store::{SessionStore, StoreOptions};
//!
//! # async fn handle(request: HeaderMap) -> Result<(), Box<dyn std::error::Error>> {
//! let pool = init_sqlite_pool(&DatabaseConfig::sqlite_memory()).await?;
//! let store = SessionStore::sqlite(pool, StoreOptions::default(), [b"secret"]).await?;
//!
//! let mut session = store.get(&request, "session").await?;
//! let count = session.get::<i64>("count").unwrap_or(0) + 1;
//! session.insert("count", count)?;
//!
//! let mut response = HeaderMap::new();
//! store.save(&mut response, &session).await?;
//! # Ok(())
//! # }
//! ```

pub mod cleanup;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod models;
pub mod repositories;
pub mod store;

pub use axum_extra::extract::cookie::SameSite;
pub use cleanup::{CleanupTask, DEFAULT_CLEANUP_INTERVAL_SECS};
pub use codec::PayloadCodec;
pub use envelope::CookieEnvelope;
pub use error::{SessionError, SessionResult};
pub use models::{CookieOptions, DEFAULT_MAX_AGE, Session, SessionRecord, SessionValues};
pub use repositories::{
    DEFAULT_TABLE_NAME, MySqlRecordStore, PgRecordStore, RecordStore, SqliteRecordStore,
};
pub use store::{SessionStore, StoreOptions};
