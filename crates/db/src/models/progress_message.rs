use deploy_core::{ProgressMessage, ProgressMessageType};

use super::millis_to_datetime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProgressMessageRow {
    pub id: i64,
    pub process_id: String,
    pub task_id: String,
    pub message_type: String,
    pub text: String,
    pub timestamp: i64,
}

impl ProgressMessageRow {
    pub fn into_domain(self) -> ProgressMessage {
        ProgressMessage {
            process_id: self.process_id,
            task_id: self.task_id,
            message_type: ProgressMessageType::parse(&self.message_type).unwrap_or_default(),
            text: self.text,
            timestamp: millis_to_datetime(self.timestamp),
        }
    }
}
