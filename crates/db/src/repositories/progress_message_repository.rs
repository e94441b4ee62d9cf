use crate::error::DbError;
use crate::models::{datetime_to_millis, ProgressMessageRow};
use deploy_core::{ProgressMessage, ProgressMessageType};
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct ProgressMessageRepository {
    pool: SqlitePool,
}

impl ProgressMessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, message: &ProgressMessage) -> Result<i64, DbError> {
        let result = sqlx::query(
            r#"
            INSERT INTO progress_messages (process_id, task_id, message_type, text, timestamp)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.process_id)
        .bind(&message.task_id)
        .bind(message.message_type.as_str())
        .bind(&message.text)
        .bind(datetime_to_millis(message.timestamp))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn find_by_process_id(
        &self,
        process_id: &str,
    ) -> Result<Vec<ProgressMessage>, DbError> {
        let rows: Vec<ProgressMessageRow> = sqlx::query_as(
            r#"
            SELECT id, process_id, task_id, message_type, text, timestamp
            FROM progress_messages
            WHERE process_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(process_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    /// Most recent error message of a process, used to report why it halted.
    pub async fn find_last_error(
        &self,
        process_id: &str,
    ) -> Result<Option<ProgressMessage>, DbError> {
        let row: Option<ProgressMessageRow> = sqlx::query_as(
            r#"
            SELECT id, process_id, task_id, message_type, text, timestamp
            FROM progress_messages
            WHERE process_id = ? AND message_type = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(process_id)
        .bind(ProgressMessageType::Error.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_domain()))
    }

    pub async fn delete_by_process_and_task(
        &self,
        process_id: &str,
        task_id: &str,
    ) -> Result<u64, DbError> {
        let result =
            sqlx::query("DELETE FROM progress_messages WHERE process_id = ? AND task_id = ?")
                .bind(process_id)
                .bind(task_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }
}
