use crate::error::DbError;
use crate::models::{datetime_to_millis, ProcessContextRow, StoredContext};
use sqlx::SqlitePool;

/// Durable storage of execution context snapshots, one row per process.
#[derive(Clone)]
pub struct ProcessContextRepository {
    pool: SqlitePool,
}

impl ProcessContextRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace the snapshot of a process.
    pub async fn save(&self, process_id: &str, snapshot: &serde_json::Value) -> Result<(), DbError> {
        let now = datetime_to_millis(chrono::Utc::now());
        let snapshot_json = serde_json::to_string(snapshot)?;

        sqlx::query(
            r#"
            INSERT INTO process_contexts (process_id, snapshot, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(process_id) DO UPDATE SET
                snapshot = excluded.snapshot,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(process_id)
        .bind(&snapshot_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_process_id(
        &self,
        process_id: &str,
    ) -> Result<Option<StoredContext>, DbError> {
        let row: Option<ProcessContextRow> = sqlx::query_as(
            r#"
            SELECT process_id, snapshot, created_at, updated_at
            FROM process_contexts
            WHERE process_id = ?
            "#,
        )
        .bind(process_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_domain()).transpose()
    }

    pub async fn get(&self, process_id: &str) -> Result<StoredContext, DbError> {
        self.find_by_process_id(process_id)
            .await?
            .ok_or_else(|| DbError::ContextNotFound(process_id.to_string()))
    }

    pub async fn list_process_ids(&self) -> Result<Vec<String>, DbError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT process_id FROM process_contexts ORDER BY updated_at DESC")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    pub async fn delete(&self, process_id: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM process_contexts WHERE process_id = ?")
            .bind(process_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
