use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ProgressMessageType {
    #[default]
    Info,
    Warning,
    Error,
    TaskStartup,
}

impl ProgressMessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::TaskStartup => "task_startup",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "task_startup" => Some(Self::TaskStartup),
            _ => None,
        }
    }
}

/// Operator-visible line attached to a process, keyed by process and task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ProgressMessage {
    pub process_id: String,
    pub task_id: String,
    pub message_type: ProgressMessageType,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressMessage {
    pub fn new(
        process_id: impl Into<String>,
        task_id: impl Into<String>,
        message_type: ProgressMessageType,
        text: impl Into<String>,
    ) -> Self {
        Self {
            process_id: process_id.into(),
            task_id: task_id.into(),
            message_type,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.message_type == ProgressMessageType::Error
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One line of a step's buffered log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessLogLine {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProcessLogLine {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Key under which a step's log lines are appended.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogKey {
    pub space_id: String,
    pub process_id: String,
    pub task_id: String,
}

impl LogKey {
    pub fn new(
        space_id: impl Into<String>,
        process_id: impl Into<String>,
        task_id: impl Into<String>,
    ) -> Self {
        Self {
            space_id: space_id.into(),
            process_id: process_id.into(),
            task_id: task_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_message_creation() {
        let message =
            ProgressMessage::new("proc-1", "uploadApp", ProgressMessageType::Error, "boom");

        assert_eq!(message.process_id, "proc-1");
        assert_eq!(message.task_id, "uploadApp");
        assert!(message.is_error());
        assert_eq!(message.text, "boom");
    }

    #[test]
    fn test_message_type_parsing() {
        assert_eq!(
            ProgressMessageType::parse("task_startup"),
            Some(ProgressMessageType::TaskStartup)
        );
        assert_eq!(ProgressMessageType::parse("fatal"), None);
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
    }
}
