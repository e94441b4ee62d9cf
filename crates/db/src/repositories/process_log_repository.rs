use crate::error::DbError;
use crate::models::{datetime_to_millis, ProcessLogRow, StoredLogLine};
use deploy_core::{LogKey, ProcessLogLine};
use sqlx::SqlitePool;

/// Append-only storage for step log buffers.
#[derive(Clone)]
pub struct ProcessLogRepository {
    pool: SqlitePool,
}

impl ProcessLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append all lines in a single transaction.
    pub async fn append(&self, key: &LogKey, lines: &[ProcessLogLine]) -> Result<u64, DbError> {
        if lines.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO process_logs (space_id, process_id, task_id, level, message, timestamp)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&key.space_id)
            .bind(&key.process_id)
            .bind(&key.task_id)
            .bind(line.level.as_str())
            .bind(&line.message)
            .bind(datetime_to_millis(line.timestamp))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(lines.len() as u64)
    }

    pub async fn find_by_key(&self, key: &LogKey) -> Result<Vec<StoredLogLine>, DbError> {
        let rows: Vec<ProcessLogRow> = sqlx::query_as(
            r#"
            SELECT id, space_id, process_id, task_id, level, message, timestamp
            FROM process_logs
            WHERE space_id = ? AND process_id = ? AND task_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(&key.space_id)
        .bind(&key.process_id)
        .bind(&key.task_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    pub async fn find_by_process_id(&self, process_id: &str) -> Result<Vec<StoredLogLine>, DbError> {
        let rows: Vec<ProcessLogRow> = sqlx::query_as(
            r#"
            SELECT id, space_id, process_id, task_id, level, message, timestamp
            FROM process_logs
            WHERE process_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(process_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }
}
