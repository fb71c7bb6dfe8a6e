//! Repositories for persisted session records
//!
//! [`RecordStore`] is the seam between the session lifecycle and the
//! relational backend. Every method is a single statement against a shared
//! pool, so implementations hold no locks of their own.

use std::future::Future;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use regex::Regex;

use crate::models::SessionRecord;

pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mysql::MySqlRecordStore;
pub use postgres::PgRecordStore;
pub use sqlite::SqliteRecordStore;

/// Default table name for session records
pub const DEFAULT_TABLE_NAME: &str = "sessions";

/// Row storage for session records, scoped to one table
pub trait RecordStore: Clone + Send + Sync + 'static {
    /// Name of the table this store reads and writes
    fn table_name(&self) -> &str;

    /// Create the table and its expiry index if they do not exist
    fn create_table(&self) -> impl Future<Output = DatabaseResult<()>> + Send;

    /// Look up a record by identifier
    fn find(&self, id: &str) -> impl Future<Output = DatabaseResult<Option<SessionRecord>>> + Send;

    /// Insert the record, or update payload and timestamps of an existing one
    ///
    /// `created_at` is only written on insert.
    fn upsert(&self, record: &SessionRecord) -> impl Future<Output = DatabaseResult<()>> + Send;

    /// Delete a record; deleting a missing record is not an error
    fn delete(&self, id: &str) -> impl Future<Output = DatabaseResult<()>> + Send;

    /// Delete every record that expired strictly before `now`
    fn delete_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = DatabaseResult<u64>> + Send;

    /// Check that the backend is reachable
    fn health_check(&self) -> impl Future<Output = DatabaseResult<bool>> + Send;
}

/// Validate a table name before it is interpolated into SQL
pub fn validate_table_name(table_name: &str) -> DatabaseResult<()> {
    static TABLE_NAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = TABLE_NAME_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("Failed to compile table name regex")
    });

    if !regex.is_match(table_name) {
        return Err(DatabaseError::Configuration(format!(
            "Invalid session table name: {:?}",
            table_name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_table_name() {
        for name in ["sessions", "abc", "_private", "app_sessions_v2"] {
            assert!(validate_table_name(name).is_ok(), "{}", name);
        }

        let too_long = "a".repeat(64);
        for name in [
            "",
            "1sessions",
            "sessions; DROP TABLE users",
            "public.sessions",
            "sess-ions",
            too_long.as_str(),
        ] {
            assert!(
                matches!(
                    validate_table_name(name),
                    Err(DatabaseError::Configuration(_))
                ),
                "{}",
                name
            );
        }
    }
}
