//! Durable storage of process contexts between ticks.

use std::collections::HashMap;

use async_trait::async_trait;
use db::ProcessContextRepository;
use tokio::sync::RwLock;

use crate::context::ContextSnapshot;
use crate::error::Result;

#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn save(&self, snapshot: &ContextSnapshot) -> Result<()>;

    async fn load(&self, process_id: &str) -> Result<Option<ContextSnapshot>>;
}

/// Snapshots stored as JSON in the `process_contexts` table.
#[derive(Clone)]
pub struct DbContextStore {
    repo: ProcessContextRepository,
}

impl DbContextStore {
    pub fn new(repo: ProcessContextRepository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ContextStore for DbContextStore {
    async fn save(&self, snapshot: &ContextSnapshot) -> Result<()> {
        let value = serde_json::to_value(snapshot)?;
        self.repo.save(&snapshot.process_id, &value).await?;
        Ok(())
    }

    async fn load(&self, process_id: &str) -> Result<Option<ContextSnapshot>> {
        match self.repo.find_by_process_id(process_id).await? {
            Some(stored) => Ok(Some(serde_json::from_value(stored.snapshot)?)),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryContextStore {
    snapshots: RwLock<HashMap<String, ContextSnapshot>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn save(&self, snapshot: &ContextSnapshot) -> Result<()> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.process_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn load(&self, process_id: &str) -> Result<Option<ContextSnapshot>> {
        Ok(self.snapshots.read().await.get(process_id).cloned())
    }
}
