use deploy_core::{Hook, StepPhase};
use events::Event;
use tracing::{debug, info_span, warn, Instrument};

use crate::context::ProcessContext;
use crate::error::Result;
use crate::helper::StepHelper;
use crate::hooks::{HookTiming, HooksCalculator};
use crate::state_machine::{StepPath, StepPhaseMachine};
use crate::step::{Step, StepKind};
use crate::variables::{HOOKS_FOR_EXECUTION, MODULE_TO_DEPLOY, PENDING_ASYNC_EXECUTIONS, STEP_PHASE};

/// Runs single ticks of steps.
///
/// A tick either enters the step (first time, after DONE of the previous
/// step, or after RETRY) or polls the work it started. A tick that triggers
/// never polls in the same call.
#[derive(Clone)]
pub struct StepExecutor {
    helper: StepHelper,
}

impl StepExecutor {
    pub fn new(helper: StepHelper) -> Self {
        Self { helper }
    }

    pub fn helper(&self) -> &StepHelper {
        &self.helper
    }

    pub async fn execute(&self, step: &dyn Step, ctx: &mut ProcessContext) -> Result<StepPhase> {
        let span = info_span!(
            "step",
            process_id = %ctx.process_id(),
            step = step.name()
        );
        self.tick(step, ctx).instrument(span).await
    }

    async fn tick(&self, step: &dyn Step, ctx: &mut ProcessContext) -> Result<StepPhase> {
        if let Err(err) = self.helper.pre_execute(ctx, step).await {
            return Err(self.helper.on_failure(ctx, step, err).await);
        }

        let polling = matches!(ctx.get(&STEP_PHASE), Ok(Some(StepPhase::Poll)));
        match self.invoke(step, ctx).await {
            Ok(phase) => match self.helper.post_success(ctx, step, phase).await {
                Ok(()) => Ok(phase),
                Err(err) => Err(self.helper.on_failure(ctx, step, err).await),
            },
            Err(err) => {
                // A failed entry is entered again from scratch.
                if !polling {
                    if let Err(e) = ctx.set(&STEP_PHASE, StepPhase::Retry) {
                        warn!(error = %e, "Failed to record step phase");
                    }
                }
                Err(self.helper.on_failure(ctx, step, err).await)
            }
        }
    }

    async fn invoke(&self, step: &dyn Step, ctx: &mut ProcessContext) -> Result<StepPhase> {
        let recorded = ctx.get(&STEP_PHASE)?;
        let kind = step.kind();
        let is_async = kind.is_async();
        let path = StepPhaseMachine::path_for(recorded, is_async);
        debug!(?recorded, ?path, "Running step");

        if path == StepPath::Entry {
            self.helper.emit(Event::StepStarted {
                process_id: ctx.process_id().to_string(),
                task_id: ctx.task_id().to_string(),
                step: step.name().to_string(),
            });
        }

        let phase = match (path, kind) {
            (_, StepKind::Sync(sync)) => sync.execute_sync(ctx).await?,
            (StepPath::Entry, StepKind::Async(async_step)) => {
                ctx.remove(&PENDING_ASYNC_EXECUTIONS);
                let (phase, executions) = async_step.execute_async(ctx).await?;
                debug!(executions = executions.len(), %phase, "Step triggered");
                phase
            }
            (StepPath::Poll, StepKind::Async(async_step)) => async_step.poll(ctx).await?,
        };

        StepPhaseMachine::validate_transition(step.name(), recorded, phase, is_async)?;
        Ok(phase)
    }

    /// Hooks of the module being deployed that have to run `timing` the
    /// step. They are stored in `hooksForExecution` and remembered as
    /// executed for their module.
    pub fn schedule_hooks(
        &self,
        step: &dyn Step,
        ctx: &mut ProcessContext,
        timing: HookTiming,
    ) -> Result<Vec<Hook>> {
        let phases = match timing {
            HookTiming::Before => step.before_hooks().map(|p| p.hooks_before(ctx)),
            HookTiming::After => step.after_hooks().map(|p| p.hooks_after(ctx)),
        }
        .transpose()?
        .unwrap_or_default();

        let hooks = match ctx.get(&MODULE_TO_DEPLOY)? {
            Some(module) if !phases.is_empty() => {
                let hooks = HooksCalculator::hooks_for_execution(ctx, &module, &phases)?;
                HooksCalculator::record_executed(ctx, &module, &hooks, &phases)?;
                hooks
            }
            _ => Vec::new(),
        };

        if hooks.is_empty() {
            ctx.remove(&HOOKS_FOR_EXECUTION);
            return Ok(hooks);
        }

        ctx.set(&HOOKS_FOR_EXECUTION, hooks.clone())?;
        self.helper.emit(Event::HooksScheduled {
            process_id: ctx.process_id().to_string(),
            task_id: step.name().to_string(),
            timing: timing.as_str().to_string(),
            hooks: hooks.iter().map(|h| h.name.clone()).collect(),
        });
        Ok(hooks)
    }
}
