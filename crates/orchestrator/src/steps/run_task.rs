use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deploy_core::{AsyncExecutionState, StepPhase};
use uuid::Uuid;

use crate::cache::ExpiringCache;
use crate::config::OrchestratorConfig;
use crate::context::ProcessContext;
use crate::error::{OrchestratorError, Result};
use crate::platform::{PlatformClient, TaskState};
use crate::step::{AsyncExecution, AsyncStep, Step, StepKind, StepTimeout};
use crate::variables::{APP_TO_PROCESS, STARTED_TASK_GUID, TASK_EXECUTION_TIMEOUT, TASK_TO_EXECUTE};

/// Runs `taskToExecute` on `appToProcess` and waits for it to finish.
pub struct RunTaskStep {
    platform: Arc<dyn PlatformClient>,
    app_guids: Arc<ExpiringCache<String, Uuid>>,
    default_timeout: Duration,
}

impl RunTaskStep {
    pub const NAME: &'static str = "runTask";

    pub fn new(platform: Arc<dyn PlatformClient>, config: &OrchestratorConfig) -> Self {
        Self {
            platform,
            app_guids: Arc::new(ExpiringCache::new(config.cache_ttl())),
            default_timeout: config.default_step_timeout(),
        }
    }

    /// Share application GUID lookups with other steps.
    pub fn with_app_guid_cache(mut self, cache: Arc<ExpiringCache<String, Uuid>>) -> Self {
        self.app_guids = cache;
        self
    }

    async fn application_guid(&self, app: &str) -> Result<Uuid> {
        let guid = self
            .app_guids
            .get_or_try_insert_with(app.to_string(), || {
                self.platform.get_application_guid(app)
            })
            .await?;
        Ok(guid)
    }
}

impl Step for RunTaskStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> StepKind<'_> {
        StepKind::Async(self)
    }

    fn error_message(&self, ctx: &ProcessContext) -> String {
        match ctx.get(&APP_TO_PROCESS) {
            Ok(Some(app)) => format!("Error executing task on application \"{app}\""),
            _ => "Error executing task".to_string(),
        }
    }
}

#[async_trait]
impl AsyncStep for RunTaskStep {
    async fn trigger(&self, ctx: &mut ProcessContext) -> Result<StepPhase> {
        if let Some(guid) = ctx.get(&STARTED_TASK_GUID)? {
            ctx.logger()
                .debug(format!("Task {guid} already started, resuming polling"));
            return Ok(StepPhase::Poll);
        }

        let task = ctx.required(&TASK_TO_EXECUTE)?;
        if task.command.trim().is_empty() {
            return Err(OrchestratorError::content(format!(
                "Task \"{}\" has no command",
                task.name
            )));
        }
        let app = ctx.required(&APP_TO_PROCESS)?;

        ctx.logger().info(format!(
            "Executing task \"{}\" on application \"{app}\"...",
            task.name
        ));
        let app_guid = self.application_guid(&app).await?;
        let started = self.platform.start_task(app_guid, &task).await?;

        ctx.set(&STARTED_TASK_GUID, started.guid)?;
        ctx.logger()
            .debug(format!("Started task \"{}\" with guid {}", started.name, started.guid));
        Ok(StepPhase::Poll)
    }

    fn async_executions(&self, _ctx: &ProcessContext) -> Vec<Arc<dyn AsyncExecution>> {
        vec![Arc::new(PollTaskExecution {
            platform: Arc::clone(&self.platform),
        })]
    }
}

impl StepTimeout for RunTaskStep {
    fn timeout(&self, ctx: &ProcessContext) -> Result<Duration> {
        Ok(ctx
            .get(&TASK_EXECUTION_TIMEOUT)?
            .unwrap_or(self.default_timeout))
    }
}

pub struct PollTaskExecution {
    platform: Arc<dyn PlatformClient>,
}

#[async_trait]
impl AsyncExecution for PollTaskExecution {
    async fn poll(&self, ctx: &mut ProcessContext) -> Result<AsyncExecutionState> {
        let guid = ctx.required(&STARTED_TASK_GUID)?;
        let task = self.platform.get_task(guid).await?;

        match task.state {
            TaskState::Pending | TaskState::Running => {
                ctx.logger()
                    .debug(format!("Task \"{}\" is {:?}", task.name, task.state));
                Ok(AsyncExecutionState::Running)
            }
            TaskState::Succeeded => {
                ctx.remove(&STARTED_TASK_GUID);
                ctx.logger()
                    .debug(format!("Task \"{}\" executed successfully", task.name));
                Ok(AsyncExecutionState::Finished)
            }
            TaskState::Failed => {
                ctx.remove(&STARTED_TASK_GUID);
                let reason = task.failure_reason.as_deref().unwrap_or("unknown reason");
                ctx.logger()
                    .warn(format!("Task \"{}\" failed: {reason}", task.name));
                Ok(AsyncExecutionState::Error)
            }
        }
    }

    fn polling_error_message(&self, ctx: &ProcessContext) -> String {
        match ctx.get(&TASK_TO_EXECUTE) {
            Ok(Some(task)) => format!("Execution of task \"{}\" failed", task.name),
            _ => "Execution of task failed".to_string(),
        }
    }
}
