//! PostgreSQL record store

use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{FromRow, PgPool};
use tracing::info;

use super::{RecordStore, validate_table_name};
use crate::models::SessionRecord;

#[derive(FromRow)]
struct SessionRow {
    id: String,
    data: Vec<u8>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        SessionRecord {
            id: row.id,
            data: row.data,
            created_at: row.created_at,
            updated_at: row.updated_at,
            expires_at: row.expires_at,
        }
    }
}

/// Session records in a PostgreSQL table
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
    table_name: String,
}

impl PgRecordStore {
    /// Create a record store over `table_name`
    pub fn new(pool: PgPool, table_name: &str) -> DatabaseResult<Self> {
        validate_table_name(table_name)?;
        Ok(Self {
            pool,
            table_name: table_name.to_string(),
        })
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl RecordStore for PgRecordStore {
    fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn create_table(&self) -> DatabaseResult<()> {
        info!("Creating session table {} if missing", self.table_name);

        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                data BYTEA NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL
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

        let row = sqlx::query_as::<_, SessionRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(SessionRecord::from))
    }

    async fn upsert(&self, record: &SessionRecord) -> DatabaseResult<()> {
        let query = format!(
            r#"
            INSERT INTO {} (id, data, created_at, updated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at,
                expires_at = EXCLUDED.expires_at
            "#,
            self.table_name
        );

        sqlx::query(&query)
            .bind(&record.id)
            .bind(&record.data)
            .bind(record.created_at)
            .bind(record.updated_at)
            .bind(record.expires_at)
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

        let result = sqlx::query(&query).bind(now).execute(&self.pool).await?;

        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        common::database::health_check(&self.pool).await
    }
}
