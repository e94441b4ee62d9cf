use chrono::{DateTime, Utc};

use super::millis_to_datetime;
use crate::error::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProcessContextRow {
    pub process_id: String,
    pub snapshot: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Serialized execution context of one process, as last saved.
#[derive(Debug, Clone)]
pub struct StoredContext {
    pub process_id: String,
    pub snapshot: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessContextRow {
    pub fn into_domain(self) -> Result<StoredContext, DbError> {
        Ok(StoredContext {
            process_id: self.process_id,
            snapshot: serde_json::from_str(&self.snapshot)?,
            created_at: millis_to_datetime(self.created_at),
            updated_at: millis_to_datetime(self.updated_at),
        })
    }
}
