use std::sync::Arc;

use async_trait::async_trait;
use deploy_core::{HookPhase, StepPhase};

use crate::context::ProcessContext;
use crate::error::Result;
use crate::hooks::{
    AfterStepHookPhaseProvider, BeforeStepHookPhaseProvider, HookAction, HookPhaseBuilder,
};
use crate::platform::PlatformClient;
use crate::step::{Step, StepKind, SyncStep};
use crate::variables::APP_TO_PROCESS;

pub struct StopApplicationStep {
    platform: Arc<dyn PlatformClient>,
}

impl StopApplicationStep {
    pub const NAME: &'static str = "stopApplication";

    pub fn new(platform: Arc<dyn PlatformClient>) -> Self {
        Self { platform }
    }
}

impl Step for StopApplicationStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> StepKind<'_> {
        StepKind::Sync(self)
    }

    fn before_hooks(&self) -> Option<&dyn BeforeStepHookPhaseProvider> {
        Some(self)
    }

    fn after_hooks(&self) -> Option<&dyn AfterStepHookPhaseProvider> {
        Some(self)
    }

    fn error_message(&self, ctx: &ProcessContext) -> String {
        match ctx.get(&APP_TO_PROCESS) {
            Ok(Some(app)) => format!("Error stopping application \"{app}\""),
            _ => "Error stopping application".to_string(),
        }
    }
}

#[async_trait]
impl SyncStep for StopApplicationStep {
    async fn execute_sync(&self, ctx: &mut ProcessContext) -> Result<StepPhase> {
        let app = ctx.required(&APP_TO_PROCESS)?;
        ctx.logger().info(format!("Stopping application \"{app}\"..."));

        match self.platform.stop_application(&app).await {
            Ok(()) => {
                ctx.logger().debug(format!("Application \"{app}\" stopped"));
                Ok(StepPhase::Done)
            }
            Err(e) if e.is_transient() => {
                ctx.logger()
                    .warn(format!("Could not stop application \"{app}\": {e}"));
                Ok(StepPhase::Retry)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl BeforeStepHookPhaseProvider for StopApplicationStep {
    fn hooks_before(&self, ctx: &ProcessContext) -> Result<Vec<HookPhase>> {
        HookPhaseBuilder::build(ctx, &[HookAction::BeforeStop])
    }
}

impl AfterStepHookPhaseProvider for StopApplicationStep {
    fn hooks_after(&self, ctx: &ProcessContext) -> Result<Vec<HookPhase>> {
        HookPhaseBuilder::build(ctx, &[HookAction::AfterStop])
    }
}
