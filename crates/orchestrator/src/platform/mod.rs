//! Facade over the cloud platform API.
//!
//! Status reads may be re-issued freely. Status-changing calls are only
//! issued by steps that first check a durable "already triggered" marker.

mod simulated;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::context::json_variable;

pub use simulated::SimulatedPlatform;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: &'static str, name: String },

    #[error("Request failed with status {status}: {description}")]
    Api { status: u16, description: String },

    #[error("Platform unavailable: {0}")]
    Unavailable(String),
}

impl PlatformError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Whether re-issuing the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::NotFound { .. } => false,
        }
    }
}

/// One-off task to run in the context of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub command: String,
    pub memory_mb: Option<u64>,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            memory_mb: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudTask {
    pub guid: Uuid,
    pub name: String,
    pub state: TaskState,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceOperationType {
    Create,
    Update,
    Delete,
}

impl ServiceOperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn in_progress_verb(&self) -> &'static str {
        match self {
            Self::Create => "creating",
            Self::Update => "updating",
            Self::Delete => "deleting",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceOperationState {
    InProgress,
    Succeeded,
    Failed,
}

/// Last operation reported for a service instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOperation {
    pub operation_type: ServiceOperationType,
    pub state: ServiceOperationState,
    pub description: Option<String>,
}

impl ServiceOperation {
    pub fn new(operation_type: ServiceOperationType, state: ServiceOperationState) -> Self {
        Self {
            operation_type,
            state,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

json_variable!(TaskSpec);

#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn get_application_guid(&self, app_name: &str) -> Result<Uuid, PlatformError>;

    async fn start_task(&self, app_guid: Uuid, task: &TaskSpec) -> Result<CloudTask, PlatformError>;

    async fn get_task(&self, task_guid: Uuid) -> Result<CloudTask, PlatformError>;

    /// `None` when the service has never had an operation.
    async fn get_service_last_operation(
        &self,
        service_name: &str,
    ) -> Result<Option<ServiceOperation>, PlatformError>;

    async fn stop_application(&self, app_name: &str) -> Result<(), PlatformError>;

    async fn unmap_routes(&self, app_name: &str) -> Result<(), PlatformError>;
}
