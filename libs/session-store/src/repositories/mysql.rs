//! MySQL record store
//!
//! Timestamps are stored as Unix milliseconds, like the SQLite store, which
//! keeps them clear of the 2038 limit of `TIMESTAMP` columns. MySQL has no
//! `CREATE INDEX IF NOT EXISTS`, so the expiry index is declared inline.

use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{MySqlPool, Row, mysql::MySqlRow};
use tracing::info;

use super::{RecordStore, validate_table_name};
use crate::models::SessionRecord;

/// Session records in a MySQL table
#[derive(Clone)]
pub struct MySqlRecordStore {
    pool: MySqlPool,
    table_name: String,
}

impl MySqlRecordStore {
    /// Create a record store over `table_name`
    pub fn new(pool: MySqlPool, table_name: &str) -> DatabaseResult<Self> {
        validate_table_name(table_name)?;
        Ok(Self {
            pool,
            table_name: table_name.to_string(),
        })
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn from_millis(millis: i64) -> DatabaseResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        DatabaseError::Configuration(format!("Timestamp out of range: {}", millis))
    })
}

fn record_from_row(row: &MySqlRow) -> DatabaseResult<SessionRecord> {
    Ok(SessionRecord {
        id: row.try_get("id")?,
        data: row.try_get("data")?,
        created_at: from_millis(row.try_get("created_at")?)?,
        updated_at: from_millis(row.try_get("updated_at")?)?,
        expires_at: from_millis(row.try_get("expires_at")?)?,
    })
}

impl RecordStore for MySqlRecordStore {
    fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn create_table(&self) -> DatabaseResult<()> {
        info!("Creating session table {} if missing", self.table_name);

        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id VARCHAR(255) NOT NULL PRIMARY KEY,
                data LONGBLOB NOT NULL,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL,
                expires_at BIGINT NOT NULL,
                INDEX {table}_expires_at_idx (expires_at)
            )
            "#,
            table = self.table_name
        );

        sqlx::query(&create_table)
            .execute(&self.pool)
            .await
            .map_err(|source| DatabaseError::Migration {
                table: self.table_name.clone(),
                source,
            })?;

        Ok(())
    }

    async fn find(&self, id: &str) -> DatabaseResult<Option<SessionRecord>> {
        let query = format!(
            r#"
            SELECT id, data, created_at, updated_at, expires_at
            FROM {}
            WHERE id = ?
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
            VALUES (?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                data = VALUES(data),
                updated_at = VALUES(updated_at),
                expires_at = VALUES(expires_at)
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
        let query = format!("DELETE FROM {} WHERE id = ?", self.table_name);

        sqlx::query(&query).bind(id).execute(&self.pool).await?;

        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> DatabaseResult<u64> {
        let query = format!("DELETE FROM {} WHERE expires_at < ?", self.table_name);

        let result = sqlx::query(&query)
            .bind(now.timestamp_millis())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        common::database::mysql_health_check(&self.pool).await
    }
}
