//! SQLite record store
//!
//! Timestamps are stored as Unix milliseconds so expiry comparisons stay
//! numeric.

use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::info;

use super::{RecordStore, validate_table_name};
use crate::models::SessionRecord;

/// Session records in a SQLite table
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
    table_name: String,
}

impl SqliteRecordStore {
    /// Create a record store over `table_name`
    pub fn new(pool: SqlitePool, table_name: &str) -> DatabaseResult<Self> {
        validate_table_name(table_name)?;
        Ok(Self {
            pool,
            table_name: table_name.to_string(),
        })
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn from_millis(millis: i64) -> DatabaseResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        DatabaseError::Configuration(format!("Timestamp out of range: {}", millis))
    })
}

fn record_from_row(row: &SqliteRow) -> DatabaseResult<SessionRecord> {
    Ok(SessionRecord {
        id: row.try_get("id")?,
        data: row.try_get("data")?,
        created_at: from_millis(row.try_get("created_at")?)?,
        updated_at: from_millis(row.try_get("updated_at")?)?,
        expires_at: from_millis(row.try_get("expires_at")?)?,
    })
}

impl RecordStore for SqliteRecordStore {
    fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn create_table(&self) -> DatabaseResult<()> {
        info!("Creating session table {} if missing", self.table_name);

        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY NOT NULL,
                data BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
            table = self.table_name
        );
        let create_index = format!(
            "CREATE INDEX IF NOT EXISTS {table}_expires_at_idx ON {table} (expires_at)",
            table = self.table_name
        );

        for statement in [create_table, create_index] {
            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .map_err(|source| DatabaseError::Migration {
                    table: self.table_name.clone(),
                    source,
                })?;
        }

        Ok(())
    }

    async fn find(&self, id: &str) -> DatabaseResult<Option<SessionRecord>> {
        let query = format!(
            r#"
            SELECT id, data, created_at, updated_at, expires_at
            FROM {}
            WHERE id = $1
            "#,
            self.table_name
        );

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn upsert(&self, record: &SessionRecord) -> DatabaseResult<()> {
        let query = format!(
            r#"
            INSERT INTO {} (id, data, created_at, updated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET data = excluded.data,
                updated_at = excluded.updated_at,
                expires_at = excluded.expires_at
            "#,
            self.table_name
        );

        sqlx::query(&query)
            .bind(&record.id)
            .bind(&record.data)
            .bind(record.created_at.timestamp_millis())
            .bind(record.updated_at.timestamp_millis())
            .bind(record.expires_at.timestamp_millis())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> DatabaseResult<()> {
        let query = format!("DELETE FROM {} WHERE id = $1", self.table_name);

        sqlx::query(&query).bind(id).execute(&self.pool).await?;

        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> DatabaseResult<u64> {
        let query = format!("DELETE FROM {} WHERE expires_at < $1", self.table_name);

        let result = sqlx::query(&query)
            .bind(now.timestamp_millis())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        common::database::sqlite_health_check(&self.pool).await
    }
}
