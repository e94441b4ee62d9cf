//! Step contracts.
//!
//! A step is one unit of deployment work. It declares through [`Step::kind`]
//! whether it finishes within a tick ([`SyncStep`]) or starts platform work
//! that is polled to completion over later ticks ([`AsyncStep`]). Hook phases
//! are separate capabilities a step may expose on top of either kind.
//!
//! Step objects are not expected to survive between ticks; every piece of
//! state they need later goes into the [`ProcessContext`].

mod timeout;

use std::sync::Arc;

use async_trait::async_trait;
use deploy_core::{AsyncExecutionState, StepPhase};

use crate::context::ProcessContext;
use crate::error::Result;
use crate::hooks::{AfterStepHookPhaseProvider, BeforeStepHookPhaseProvider};
use crate::polling::PollingAggregator;

pub use timeout::{StepTimeout, TimeoutGuard};

pub enum StepKind<'a> {
    Sync(&'a dyn SyncStep),
    Async(&'a dyn AsyncStep),
}

impl StepKind<'_> {
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

pub trait Step: Send + Sync {
    /// Stable name, also used as the activity id and in per-step variables.
    fn name(&self) -> &str;

    fn kind(&self) -> StepKind<'_>;

    fn before_hooks(&self) -> Option<&dyn BeforeStepHookPhaseProvider> {
        None
    }

    fn after_hooks(&self) -> Option<&dyn AfterStepHookPhaseProvider> {
        None
    }

    /// Context written to the log next to a failure of this step.
    fn error_message(&self, _ctx: &ProcessContext) -> String {
        format!("Error executing step \"{}\"", self.name())
    }
}

/// Step that completes within one tick.
#[async_trait]
pub trait SyncStep: Send + Sync {
    /// Must return DONE or RETRY.
    async fn execute_sync(&self, ctx: &mut ProcessContext) -> Result<StepPhase>;
}

/// Step whose platform work completes outside of the tick that started it.
#[async_trait]
pub trait AsyncStep: Send + Sync {
    /// Issue the triggering platform call(s).
    ///
    /// Implementations check for their "already triggered" marker first and
    /// return POLL without calling the platform again when it is present.
    async fn trigger(&self, ctx: &mut ProcessContext) -> Result<StepPhase>;

    /// Pollers observing the operations started by [`AsyncStep::trigger`].
    /// Their order must be stable for a given context.
    fn async_executions(&self, ctx: &ProcessContext) -> Vec<Arc<dyn AsyncExecution>>;

    async fn execute_async(
        &self,
        ctx: &mut ProcessContext,
    ) -> Result<(StepPhase, Vec<Arc<dyn AsyncExecution>>)> {
        let phase = self.trigger(ctx).await?;
        let executions = if phase == StepPhase::Poll {
            self.async_executions(ctx)
        } else {
            Vec::new()
        };
        Ok((phase, executions))
    }

    async fn poll(&self, ctx: &mut ProcessContext) -> Result<StepPhase> {
        let executions = self.async_executions(ctx);
        PollingAggregator::new(executions)
            .poll(ctx)
            .await?
            .into_phase()
    }
}

/// Stateless check of one outstanding platform operation.
#[async_trait]
pub trait AsyncExecution: Send + Sync {
    async fn poll(&self, ctx: &mut ProcessContext) -> Result<AsyncExecutionState>;

    /// Diagnostic reported when [`AsyncExecution::poll`] returned ERROR.
    fn polling_error_message(&self, ctx: &ProcessContext) -> String;
}
