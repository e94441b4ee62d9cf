//! Cross-cutting bookkeeping around every step tick.

use std::sync::Arc;

use deploy_core::{LogKey, ProgressMessage, StepPhase};
use events::{Event, EventBus};
use tracing::{debug, error, warn};

use crate::context::ProcessContext;
use crate::error::{OrchestratorError, Result};
use crate::sinks::{ProcessLogSink, ProgressMessageSink};
use crate::step::Step;
use crate::variables::{ERROR_TYPE, PROCESS_ABORTED, STEP_PHASE};

/// Runs before and after a step body: abort check, phase recording, error
/// classification and flushing of the step's buffered output.
#[derive(Clone)]
pub struct StepHelper {
    progress: Arc<dyn ProgressMessageSink>,
    logs: Arc<dyn ProcessLogSink>,
    event_bus: Option<EventBus>,
}

impl StepHelper {
    pub fn new(progress: Arc<dyn ProgressMessageSink>, logs: Arc<dyn ProcessLogSink>) -> Self {
        Self {
            progress,
            logs,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn event_bus(&self) -> Option<&EventBus> {
        self.event_bus.as_ref()
    }

    /// Clears the previous classification and honours the abort flag. The
    /// step body must not run when this fails.
    ///
    /// A step entered again after a failure starts with none of the
    /// progress messages its failed execution left.
    pub async fn pre_execute(&self, ctx: &mut ProcessContext, step: &dyn Step) -> Result<()> {
        ctx.set_task_id(step.name());
        if ctx.remove(&ERROR_TYPE) {
            debug!(step = step.name(), "Dropping progress of failed execution");
            self.progress
                .delete_for_task(ctx.process_id(), ctx.task_id())
                .await?;
        }

        if ctx.get_or(&PROCESS_ABORTED, false)? {
            self.emit(Event::ProcessAborted {
                process_id: ctx.process_id().to_string(),
                task_id: ctx.task_id().to_string(),
            });
            return Err(OrchestratorError::Aborted);
        }
        Ok(())
    }

    /// Records `phase` and flushes the step's output.
    ///
    /// The phase stays recorded when the flush fails: the step body has
    /// already changed the context to match it.
    pub async fn post_success(
        &self,
        ctx: &mut ProcessContext,
        step: &dyn Step,
        phase: StepPhase,
    ) -> Result<()> {
        ctx.set(&STEP_PHASE, phase)?;
        debug!(step = step.name(), %phase, "Recorded step phase");

        self.flush(ctx).await?;
        self.emit(Event::StepPhaseRecorded {
            process_id: ctx.process_id().to_string(),
            task_id: ctx.task_id().to_string(),
            step: step.name().to_string(),
            phase: phase.to_string(),
        });
        Ok(())
    }

    /// Classifies `err`, persists it for the operator and hands it back.
    ///
    /// A failed poll is recorded as RETRY so that a retry of the process
    /// enters the step again instead of re-reading the failed operation.
    pub async fn on_failure(
        &self,
        ctx: &mut ProcessContext,
        step: &dyn Step,
        err: OrchestratorError,
    ) -> OrchestratorError {
        let error_type = err.error_type();
        if let Err(e) = ctx.set(&ERROR_TYPE, error_type) {
            warn!(error = %e, "Failed to record error type");
        }
        if matches!(err, OrchestratorError::PollingFailed(_)) {
            if let Err(e) = ctx.set(&STEP_PHASE, StepPhase::Retry) {
                warn!(error = %e, "Failed to record step phase");
            }
        }

        error!(
            step = step.name(),
            %error_type,
            error = %err,
            "{}",
            step.error_message(ctx)
        );
        ctx.logger().error(err.to_string());

        if let Err(e) = self.flush(ctx).await {
            warn!(error = %e, "Failed to flush step output after failure");
        }
        self.emit(Event::StepFailed {
            process_id: ctx.process_id().to_string(),
            task_id: ctx.task_id().to_string(),
            error_type: error_type.to_string(),
            message: err.to_string(),
        });
        err
    }

    /// Writes buffered log lines and progress entries to their sinks.
    pub async fn flush(&self, ctx: &mut ProcessContext) -> Result<()> {
        let process_id = ctx.process_id().to_string();
        let task_id = ctx.task_id().to_string();
        let space_id = ctx.space_id().to_string();

        let logger = ctx.logger();
        let lines = logger.take_lines();
        let progress = logger.take_progress();
        let polling_progress = logger.take_polling_progress();

        if !lines.is_empty() {
            let key = LogKey::new(space_id, process_id.clone(), task_id.clone());
            self.logs.append(&key, lines).await?;
        }
        for entry in progress {
            let message =
                ProgressMessage::new(&process_id, &task_id, entry.message_type, entry.text);
            self.progress.add(message).await?;
        }
        if let Some((finished, total)) = polling_progress {
            self.emit(Event::PollingProgress {
                process_id,
                task_id,
                finished,
                total,
            });
        }
        Ok(())
    }

    pub fn emit(&self, event: Event) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event);
        }
    }
}
