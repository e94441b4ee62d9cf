//! Simulated deployment used by the `deploy` and `resume` commands.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use deploy_core::{Hook, HookPhase, Module};
use orchestrator::platform::{
    ServiceOperation, ServiceOperationState, ServiceOperationType, TaskSpec, TaskState,
};
use orchestrator::steps::{
    PollServiceOperationsStep, RunTaskStep, StopApplicationStep, UnmapRoutesStep,
};
use orchestrator::variables::{
    APP_TO_PROCESS, MODULE_TO_DEPLOY, TASK_EXECUTION_TIMEOUT, TASK_TO_EXECUTE,
    TRIGGERED_SERVICE_OPERATIONS,
};
use orchestrator::{OrchestratorConfig, ProcessContext, SimulatedPlatform, Step, TimeoutGuard};

#[derive(Debug, Clone)]
pub struct DemoDeployment {
    pub app: String,
    pub task_name: String,
    pub command: String,
    /// `name:operation` pairs, e.g. `db:create`.
    pub services: Vec<String>,
    pub task_polls: usize,
    pub fail_task: bool,
    pub task_timeout: Option<Duration>,
    pub with_hooks: bool,
}

impl DemoDeployment {
    /// Rebuild the deployment a stored process was started with.
    ///
    /// The simulated platform starts over, so a task that was already
    /// started before the process halted is unknown to it.
    pub fn from_context(ctx: &ProcessContext, task_polls: usize) -> Result<Self> {
        let task = ctx.required(&TASK_TO_EXECUTE)?;
        let services = ctx
            .get_or(&TRIGGERED_SERVICE_OPERATIONS, BTreeMap::new())?
            .into_iter()
            .map(|(name, operation)| format!("{name}:{}", operation.as_str()))
            .collect();
        Ok(Self {
            app: ctx.required(&APP_TO_PROCESS)?,
            task_name: task.name,
            command: task.command,
            services,
            task_polls,
            fail_task: false,
            task_timeout: ctx.get(&TASK_EXECUTION_TIMEOUT)?,
            with_hooks: ctx.contains(&MODULE_TO_DEPLOY),
        })
    }

    pub fn services(&self) -> Result<BTreeMap<String, ServiceOperationType>> {
        self.services
            .iter()
            .map(|entry| parse_service(entry))
            .collect()
    }

    /// Platform scripted so that every operation settles after `task_polls` reads.
    pub fn platform(&self) -> Result<SimulatedPlatform> {
        let mut task_script = vec![TaskState::Running; self.task_polls.saturating_sub(1)];
        task_script.push(if self.fail_task {
            TaskState::Failed
        } else {
            TaskState::Succeeded
        });

        let mut platform = SimulatedPlatform::new()
            .with_application(&self.app)
            .with_task_script(&self.task_name, &task_script);

        for (service, operation) in self.services()? {
            let mut script =
                vec![
                    ServiceOperation::new(operation, ServiceOperationState::InProgress);
                    self.task_polls.saturating_sub(1)
                ];
            script.push(ServiceOperation::new(
                operation,
                ServiceOperationState::Succeeded,
            ));
            platform = platform.with_service_script(service, script);
        }
        Ok(platform)
    }

    pub fn steps(
        &self,
        platform: Arc<SimulatedPlatform>,
        config: &OrchestratorConfig,
    ) -> Vec<Arc<dyn Step>> {
        vec![
            Arc::new(TimeoutGuard::new(PollServiceOperationsStep::new(
                platform.clone(),
                config,
            ))),
            Arc::new(StopApplicationStep::new(platform.clone())),
            Arc::new(TimeoutGuard::new(RunTaskStep::new(platform.clone(), config))),
            Arc::new(UnmapRoutesStep::new(platform)),
        ]
    }

    pub fn context(&self, process_id: &str, space_id: &str) -> Result<ProcessContext> {
        let mut ctx = ProcessContext::new(process_id, space_id);
        ctx.set(&APP_TO_PROCESS, self.app.clone())?;
        ctx.set(
            &TASK_TO_EXECUTE,
            TaskSpec::new(&self.task_name, &self.command),
        )?;
        ctx.set(&TRIGGERED_SERVICE_OPERATIONS, self.services()?)?;
        if let Some(timeout) = self.task_timeout {
            ctx.set(&TASK_EXECUTION_TIMEOUT, timeout)?;
        }
        if self.with_hooks {
            ctx.set(
                &MODULE_TO_DEPLOY,
                Module::new(&self.app, 3)
                    .with_hook(Hook::new(
                        "drain-traffic",
                        &[HookPhase::DeployApplicationBeforeStop],
                    ))
                    .with_hook(Hook::new(
                        "notify-stopped",
                        &[HookPhase::DeployApplicationAfterStop],
                    )),
            )?;
        }
        Ok(ctx)
    }
}

fn parse_service(entry: &str) -> Result<(String, ServiceOperationType)> {
    let (name, operation) = entry
        .split_once(':')
        .with_context(|| format!("Expected <name>:<operation>, got \"{entry}\""))?;
    let operation = match operation {
        "create" => ServiceOperationType::Create,
        "update" => ServiceOperationType::Update,
        "delete" => ServiceOperationType::Delete,
        other => bail!("Unknown service operation \"{other}\""),
    };
    if name.is_empty() {
        bail!("Service name missing in \"{entry}\"");
    }
    Ok((name.to_string(), operation))
}
