//! Destinations for progress messages and step logs.

use std::collections::HashMap;

use async_trait::async_trait;
use db::{ProcessLogRepository, ProgressMessageRepository};
use deploy_core::{LogKey, ProcessLogLine, ProgressMessage};
use tokio::sync::RwLock;

use crate::error::Result;

/// Accepts operator-visible messages keyed by process.
#[async_trait]
pub trait ProgressMessageSink: Send + Sync {
    async fn add(&self, message: ProgressMessage) -> Result<()>;

    /// Drops the messages a task left behind in an earlier execution.
    async fn delete_for_task(&self, process_id: &str, task_id: &str) -> Result<()>;
}

/// Accepts append-only log buffers keyed by (space, process, task).
#[async_trait]
pub trait ProcessLogSink: Send + Sync {
    async fn append(&self, key: &LogKey, lines: Vec<ProcessLogLine>) -> Result<()>;
}

#[async_trait]
impl ProgressMessageSink for ProgressMessageRepository {
    async fn add(&self, message: ProgressMessage) -> Result<()> {
        self.create(&message).await?;
        Ok(())
    }

    async fn delete_for_task(&self, process_id: &str, task_id: &str) -> Result<()> {
        self.delete_by_process_and_task(process_id, task_id).await?;
        Ok(())
    }
}

#[async_trait]
impl ProcessLogSink for ProcessLogRepository {
    async fn append(&self, key: &LogKey, lines: Vec<ProcessLogLine>) -> Result<()> {
        ProcessLogRepository::append(self, key, &lines).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProgressMessages {
    messages: RwLock<Vec<ProgressMessage>>,
}

impl InMemoryProgressMessages {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<ProgressMessage> {
        self.messages.read().await.clone()
    }

    pub async fn texts_for(&self, process_id: &str) -> Vec<String> {
        self.messages
            .read()
            .await
            .iter()
            .filter(|m| m.process_id == process_id)
            .map(|m| m.text.clone())
            .collect()
    }
}

#[async_trait]
impl ProgressMessageSink for InMemoryProgressMessages {
    async fn add(&self, message: ProgressMessage) -> Result<()> {
        self.messages.write().await.push(message);
        Ok(())
    }

    async fn delete_for_task(&self, process_id: &str, task_id: &str) -> Result<()> {
        self.messages
            .write()
            .await
            .retain(|m| m.process_id != process_id || m.task_id != task_id);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProcessLogs {
    lines: RwLock<HashMap<LogKey, Vec<ProcessLogLine>>>,
}

impl InMemoryProcessLogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lines_for(&self, key: &LogKey) -> Vec<ProcessLogLine> {
        self.lines.read().await.get(key).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ProcessLogSink for InMemoryProcessLogs {
    async fn append(&self, key: &LogKey, lines: Vec<ProcessLogLine>) -> Result<()> {
        self.lines
            .write()
            .await
            .entry(key.clone())
            .or_default()
            .extend(lines);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploy_core::{LogLevel, ProgressMessageType};

    #[tokio::test]
    async fn test_in_memory_progress_filters_by_process() {
        let sink = InMemoryProgressMessages::new();
        sink.add(ProgressMessage::new("a", "t", ProgressMessageType::Info, "one"))
            .await
            .unwrap();
        sink.add(ProgressMessage::new("b", "t", ProgressMessageType::Info, "two"))
            .await
            .unwrap();

        assert_eq!(sink.texts_for("a").await, vec!["one"]);
        assert_eq!(sink.messages().await.len(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_delete_for_task() {
        let sink = InMemoryProgressMessages::new();
        for (task, text) in [("runTask", "started"), ("stopApp", "stopped"), ("runTask", "failed")] {
            sink.add(ProgressMessage::new("a", task, ProgressMessageType::Info, text))
                .await
                .unwrap();
        }
        sink.add(ProgressMessage::new("b", "runTask", ProgressMessageType::Info, "other"))
            .await
            .unwrap();

        sink.delete_for_task("a", "runTask").await.unwrap();

        assert_eq!(sink.texts_for("a").await, vec!["stopped"]);
        assert_eq!(sink.texts_for("b").await, vec!["other"]);
    }

    #[tokio::test]
    async fn test_in_memory_logs_append() {
        let sink = InMemoryProcessLogs::new();
        let key = LogKey::new("space", "proc", "task");

        sink.append(&key, vec![ProcessLogLine::new(LogLevel::Info, "a")])
            .await
            .unwrap();
        sink.append(&key, vec![ProcessLogLine::new(LogLevel::Debug, "b")])
            .await
            .unwrap();

        let lines = sink.lines_for(&key).await;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].message, "b");
    }

    #[tokio::test]
    async fn test_repository_sinks() {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        let progress: &dyn ProgressMessageSink = &ProgressMessageRepository::new(pool.clone());
        let logs = ProcessLogRepository::new(pool.clone());
        let key = LogKey::new("space", "proc", "task");

        progress
            .add(ProgressMessage::new("proc", "task", ProgressMessageType::Error, "boom"))
            .await
            .unwrap();
        ProcessLogSink::append(&logs, &key, vec![ProcessLogLine::new(LogLevel::Info, "line")])
            .await
            .unwrap();

        let stored = ProgressMessageRepository::new(pool.clone())
            .find_last_error("proc")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.text, "boom");
        assert_eq!(logs.find_by_key(&key).await.unwrap().len(), 1);

        progress.delete_for_task("proc", "task").await.unwrap();
        assert!(ProgressMessageRepository::new(pool)
            .find_by_process_id("proc")
            .await
            .unwrap()
            .is_empty());
    }
}
