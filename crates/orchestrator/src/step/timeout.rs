use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deploy_core::StepPhase;
use tracing::warn;

use super::{AsyncExecution, AsyncStep, Step, StepKind};
use crate::context::{ProcessContext, Variable};
use crate::error::{OrchestratorError, Result};
use crate::hooks::{AfterStepHookPhaseProvider, BeforeStepHookPhaseProvider};
use crate::variables;

pub trait StepTimeout {
    /// May read a process variable so operators can override it per process.
    fn timeout(&self, ctx: &ProcessContext) -> Result<Duration>;
}

/// Enforces [`StepTimeout::timeout`] across the polls of an async step.
///
/// The start time is recorded the first time the step is entered and kept
/// in the context; every poll compares against it before delegating. The
/// check is only as precise as the polling interval.
pub struct TimeoutGuard<S> {
    inner: S,
}

impl<S> TimeoutGuard<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: Step + AsyncStep + StepTimeout> TimeoutGuard<S> {
    fn start_time(&self) -> Variable<DateTime<Utc>> {
        variables::step_start_time(self.inner.name())
    }

    fn check_deadline(&self, ctx: &mut ProcessContext) -> Result<()> {
        let start_time = self.start_time();
        let Some(started_at) = ctx.get(&start_time)? else {
            warn!(step = self.inner.name(), "No start time recorded, starting the clock now");
            ctx.set(&start_time, Utc::now())?;
            return Ok(());
        };

        let timeout = self.inner.timeout(ctx)?;
        let elapsed = (Utc::now() - started_at).to_std().unwrap_or_default();
        if elapsed > timeout {
            return Err(OrchestratorError::timeout(self.inner.name(), timeout));
        }
        Ok(())
    }
}

impl<S: Step + AsyncStep + StepTimeout> Step for TimeoutGuard<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> StepKind<'_> {
        StepKind::Async(self)
    }

    fn before_hooks(&self) -> Option<&dyn BeforeStepHookPhaseProvider> {
        self.inner.before_hooks()
    }

    fn after_hooks(&self) -> Option<&dyn AfterStepHookPhaseProvider> {
        self.inner.after_hooks()
    }

    fn error_message(&self, ctx: &ProcessContext) -> String {
        self.inner.error_message(ctx)
    }
}

#[async_trait]
impl<S: Step + AsyncStep + StepTimeout> AsyncStep for TimeoutGuard<S> {
    async fn trigger(&self, ctx: &mut ProcessContext) -> Result<StepPhase> {
        let start_time = self.start_time();
        if ctx.get(&variables::STEP_PHASE)? == Some(StepPhase::Retry) {
            ctx.remove(&start_time);
        }
        if !ctx.contains(&start_time) {
            ctx.set(&start_time, Utc::now())?;
        }

        let phase = self.inner.trigger(ctx).await?;
        if phase == StepPhase::Done {
            ctx.remove(&start_time);
        }
        Ok(phase)
    }

    fn async_executions(&self, ctx: &ProcessContext) -> Vec<Arc<dyn AsyncExecution>> {
        self.inner.async_executions(ctx)
    }

    async fn poll(&self, ctx: &mut ProcessContext) -> Result<StepPhase> {
        self.check_deadline(ctx)?;

        let phase = self.inner.poll(ctx).await?;
        if phase == StepPhase::Done {
            ctx.remove(&self.start_time());
        }
        Ok(phase)
    }
}
