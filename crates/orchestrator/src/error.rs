use std::time::Duration;

use deploy_core::{ErrorType, StepPhase};
use thiserror::Error;

use crate::context::VariableError;
use crate::platform::PlatformError;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Invalid input or descriptor content. The message is shown to the
    /// operator verbatim.
    #[error("{0}")]
    Content(String),

    #[error("Process was aborted")]
    Aborted,

    #[error(
        "Execution of step \"{step}\" has timed out after {} seconds",
        .timeout.as_secs()
    )]
    Timeout { step: String, timeout: Duration },

    /// An async execution reported ERROR; carries its diagnostic message.
    #[error("{0}")]
    PollingFailed(String),

    #[error("Step \"{step}\" returned phase {to} which is not allowed after {from}")]
    InvalidPhase {
        step: String,
        from: String,
        to: StepPhase,
    },

    #[error("Retry limit of {max_retries} reached for step \"{step}\"")]
    RetryLimitExceeded { step: String, max_retries: u32 },

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Variable(#[from] VariableError),

    #[error("Database error: {0}")]
    Database(#[from] db::DbError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl OrchestratorError {
    pub fn content(message: impl Into<String>) -> Self {
        Self::Content(message.into())
    }

    pub fn timeout(step: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            step: step.into(),
            timeout,
        }
    }

    /// Classification persisted as the process error type.
    pub fn error_type(&self) -> ErrorType {
        match self {
            Self::Content(_) => ErrorType::ContentError,
            Self::Aborted => ErrorType::AbortError,
            Self::Timeout { .. } => ErrorType::TimeoutError,
            _ => ErrorType::UnknownError,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
