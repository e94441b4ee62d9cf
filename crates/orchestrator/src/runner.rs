//! In-process driver for an ordered list of steps.
//!
//! The runner ticks the current step until it reports DONE, sleeping for
//! the poll interval between POLL ticks, and persists the context after
//! every tick. A process that stopped for any reason is picked up again by
//! [`ProcessRunner::resume`] at the step and phase it was in.

use std::sync::Arc;

use async_trait::async_trait;
use deploy_core::{ErrorType, Hook, StepPhase};
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::context::ProcessContext;
use crate::error::{OrchestratorError, Result};
use crate::executor::StepExecutor;
use crate::hooks::HookTiming;
use crate::step::Step;
use crate::store::ContextStore;
use crate::variables::{
    step_start_time, CURRENT_STEP_INDEX, ERROR_TYPE, PROCESS_ABORTED, STEP_PHASE,
    STEP_RETRY_COUNT,
};

/// Executes hooks selected around a step.
#[async_trait]
pub trait HookRunner: Send + Sync {
    async fn run_hooks(
        &self,
        hooks: &[Hook],
        timing: HookTiming,
        ctx: &mut ProcessContext,
    ) -> Result<()>;
}

/// Records hooks in the step log without running anything.
#[derive(Debug, Default)]
pub struct LoggingHookRunner;

#[async_trait]
impl HookRunner for LoggingHookRunner {
    async fn run_hooks(
        &self,
        hooks: &[Hook],
        timing: HookTiming,
        ctx: &mut ProcessContext,
    ) -> Result<()> {
        let step = ctx.task_id().to_string();
        for hook in hooks {
            ctx.logger().info(format!(
                "Executing hook \"{}\" {} step \"{step}\"",
                hook.name,
                timing.as_str()
            ));
            if let Some(command) = &hook.command {
                ctx.logger().debug(format!("Hook command: {command}"));
            }
        }
        Ok(())
    }
}

pub struct ProcessRunner {
    executor: StepExecutor,
    steps: Vec<Arc<dyn Step>>,
    store: Arc<dyn ContextStore>,
    hook_runner: Arc<dyn HookRunner>,
    config: OrchestratorConfig,
}

impl ProcessRunner {
    pub fn new(
        executor: StepExecutor,
        store: Arc<dyn ContextStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            executor,
            steps: Vec::new(),
            store,
            hook_runner: Arc::new(LoggingHookRunner),
            config,
        }
    }

    pub fn with_step(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_steps(mut self, steps: impl IntoIterator<Item = Arc<dyn Step>>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn with_hook_runner(mut self, hook_runner: Arc<dyn HookRunner>) -> Self {
        self.hook_runner = hook_runner;
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run a new process from its first step.
    pub async fn start(&self, mut ctx: ProcessContext) -> Result<ProcessContext> {
        info!(
            process_id = %ctx.process_id(),
            steps = self.steps.len(),
            "Starting process"
        );
        ctx.set(&CURRENT_STEP_INDEX, 0)?;
        ctx.remove(&STEP_PHASE);
        self.save(&ctx).await?;
        self.run(ctx).await
    }

    /// Continue a stored process at the step and phase it stopped in.
    ///
    /// A step that recorded DONE is not run again. A process that timed out
    /// gets a fresh deadline. The abort flag is kept, so an aborted process
    /// fails again right away.
    pub async fn resume(&self, process_id: &str) -> Result<ProcessContext> {
        let mut ctx = self.load(process_id).await?;

        if ctx.get(&ERROR_TYPE)? == Some(ErrorType::TimeoutError) {
            if let Some(step) = self.current_step(&ctx)? {
                ctx.remove(&step_start_time(step.name()));
            }
        }
        ctx.remove(&STEP_RETRY_COUNT);

        let step_index = ctx.get_or(&CURRENT_STEP_INDEX, 0)?;
        let phase = ctx.get(&STEP_PHASE)?;
        info!(process_id, step_index, ?phase, "Resuming process");
        self.run(ctx).await
    }

    /// Ask a process to stop before its next step tick.
    pub async fn abort(&self, process_id: &str) -> Result<()> {
        let mut ctx = self.load(process_id).await?;
        ctx.set(&PROCESS_ABORTED, true)?;
        self.save(&ctx).await?;
        info!(process_id, "Abort requested");
        Ok(())
    }

    pub async fn load(&self, process_id: &str) -> Result<ProcessContext> {
        let snapshot = self
            .store
            .load(process_id)
            .await?
            .ok_or_else(|| OrchestratorError::ProcessNotFound(process_id.to_string()))?;
        Ok(ProcessContext::restore(snapshot))
    }

    fn current_step(&self, ctx: &ProcessContext) -> Result<Option<Arc<dyn Step>>> {
        let index = ctx.get_or(&CURRENT_STEP_INDEX, 0)?;
        Ok(usize::try_from(index)
            .ok()
            .and_then(|i| self.steps.get(i))
            .cloned())
    }

    async fn run(&self, mut ctx: ProcessContext) -> Result<ProcessContext> {
        while let Some(step) = self.current_step(&ctx)? {
            if let Err(e) = self.run_step(step.as_ref(), &mut ctx).await {
                if let Err(save_err) = self.save(&ctx).await {
                    warn!(error = %save_err, "Failed to save context of failed process");
                }
                return Err(e);
            }

            let index = ctx.get_or(&CURRENT_STEP_INDEX, 0)?;
            ctx.set(&CURRENT_STEP_INDEX, index + 1)?;
            ctx.remove(&STEP_PHASE);
            ctx.remove(&STEP_RETRY_COUNT);
            self.save(&ctx).await?;
        }

        info!(process_id = %ctx.process_id(), "Process finished");
        Ok(ctx)
    }

    async fn run_step(&self, step: &dyn Step, ctx: &mut ProcessContext) -> Result<()> {
        ctx.set_task_id(step.name());
        match ctx.get(&STEP_PHASE)? {
            // Finished before the process stopped, only the after hooks are left.
            Some(StepPhase::Done) => {
                debug!(step = step.name(), "Step already done");
                ctx.remove(&ERROR_TYPE);
                return self.run_hooks(step, ctx, HookTiming::After).await;
            }
            Some(StepPhase::Poll) => {}
            _ => self.run_hooks(step, ctx, HookTiming::Before).await?,
        }

        loop {
            self.refresh_abort_flag(ctx).await?;
            let phase = self.executor.execute(step, ctx).await?;
            self.save(ctx).await?;

            match phase {
                StepPhase::Done => break,
                StepPhase::Poll => {
                    debug!(step = step.name(), "Waiting before next poll");
                }
                StepPhase::Retry => {
                    let retries = ctx.get_or(&STEP_RETRY_COUNT, 0)? + 1;
                    if retries > i64::from(self.config.max_retries) {
                        let err = OrchestratorError::RetryLimitExceeded {
                            step: step.name().to_string(),
                            max_retries: self.config.max_retries,
                        };
                        return Err(self.executor.helper().on_failure(ctx, step, err).await);
                    }
                    ctx.set(&STEP_RETRY_COUNT, retries)?;
                    warn!(step = step.name(), retries, "Step asked to be retried");
                }
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }

        self.run_hooks(step, ctx, HookTiming::After).await
    }

    async fn run_hooks(
        &self,
        step: &dyn Step,
        ctx: &mut ProcessContext,
        timing: HookTiming,
    ) -> Result<()> {
        let hooks = match self.executor.schedule_hooks(step, ctx, timing) {
            Ok(hooks) => hooks,
            Err(e) => return Err(self.executor.helper().on_failure(ctx, step, e).await),
        };
        if hooks.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.hook_runner.run_hooks(&hooks, timing, ctx).await {
            return Err(self.executor.helper().on_failure(ctx, step, e).await);
        }
        self.executor.helper().flush(ctx).await
    }

    /// Picks up an abort requested through the store while this runner
    /// held the context in memory.
    async fn refresh_abort_flag(&self, ctx: &mut ProcessContext) -> Result<()> {
        if ctx.get_or(&PROCESS_ABORTED, false)? {
            return Ok(());
        }
        let Some(stored) = self.store.load(ctx.process_id()).await? else {
            return Ok(());
        };
        if ProcessContext::restore(stored).get_or(&PROCESS_ABORTED, false)? {
            ctx.set(&PROCESS_ABORTED, true)?;
        }
        Ok(())
    }

    async fn save(&self, ctx: &ProcessContext) -> Result<()> {
        self.store.save(&ctx.snapshot()).await
    }
}
