use deploy_core::{LogKey, LogLevel, ProcessLogLine};

use super::millis_to_datetime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProcessLogRow {
    pub id: i64,
    pub space_id: String,
    pub process_id: String,
    pub task_id: String,
    pub level: String,
    pub message: String,
    pub timestamp: i64,
}

/// A persisted log line together with the key it was appended under.
#[derive(Debug, Clone)]
pub struct StoredLogLine {
    pub id: i64,
    pub key: LogKey,
    pub line: ProcessLogLine,
}

impl ProcessLogRow {
    pub fn into_domain(self) -> StoredLogLine {
        StoredLogLine {
            id: self.id,
            key: LogKey::new(self.space_id, self.process_id, self.task_id),
            line: ProcessLogLine {
                level: LogLevel::parse(&self.level).unwrap_or(LogLevel::Info),
                message: self.message,
                timestamp: millis_to_datetime(self.timestamp),
            },
        }
    }
}
