use std::sync::Arc;

use async_trait::async_trait;
use deploy_core::{HookPhase, StepPhase};

use crate::context::ProcessContext;
use crate::error::Result;
use crate::hooks::{BeforeStepHookPhaseProvider, HookAction, HookPhaseBuilder};
use crate::platform::PlatformClient;
use crate::step::{Step, StepKind, SyncStep};
use crate::variables::{APP_TO_PROCESS, USES_CUSTOM_ROUTES};

pub struct UnmapRoutesStep {
    platform: Arc<dyn PlatformClient>,
}

impl UnmapRoutesStep {
    pub const NAME: &'static str = "unmapRoutes";

    pub fn new(platform: Arc<dyn PlatformClient>) -> Self {
        Self { platform }
    }
}

impl Step for UnmapRoutesStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> StepKind<'_> {
        StepKind::Sync(self)
    }

    fn before_hooks(&self) -> Option<&dyn BeforeStepHookPhaseProvider> {
        Some(self)
    }
}

#[async_trait]
impl SyncStep for UnmapRoutesStep {
    async fn execute_sync(&self, ctx: &mut ProcessContext) -> Result<StepPhase> {
        let app = ctx.required(&APP_TO_PROCESS)?;
        ctx.logger()
            .info(format!("Unmapping routes of application \"{app}\"..."));
        self.platform.unmap_routes(&app).await?;
        Ok(StepPhase::Done)
    }
}

impl BeforeStepHookPhaseProvider for UnmapRoutesStep {
    /// Only applications that own routes get the before-unmap-routes hook.
    fn hooks_before(&self, ctx: &ProcessContext) -> Result<Vec<HookPhase>> {
        if !ctx.get_or(&USES_CUSTOM_ROUTES, false)? {
            return Ok(Vec::new());
        }
        HookPhaseBuilder::build(ctx, &[HookAction::BeforeUnmapRoutes])
    }
}
