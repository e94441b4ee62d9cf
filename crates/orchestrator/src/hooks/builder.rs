use deploy_core::{BlueGreenStage, HookPhase, ProcessType};

use crate::context::ProcessContext;
use crate::error::Result;
use crate::variables::{BLUE_GREEN_STAGE, PROCESS_TYPE};

/// Lifecycle action a step performs on an application, independent of the
/// kind of process it runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    BeforeStop,
    AfterStop,
    BeforeUnmapRoutes,
    BeforeStart,
}

/// Turns lifecycle actions into the concrete phases of the running process.
pub struct HookPhaseBuilder;

impl HookPhaseBuilder {
    /// Phases for `actions`, in the same order. Actions with no phase in the
    /// current process type are skipped.
    pub fn build(ctx: &ProcessContext, actions: &[HookAction]) -> Result<Vec<HookPhase>> {
        let process_type = ctx.get_or(&PROCESS_TYPE, ProcessType::Deploy)?;
        let stage = ctx.get_or(&BLUE_GREEN_STAGE, BlueGreenStage::Idle)?;

        Ok(actions
            .iter()
            .filter_map(|action| Self::phase_for(*action, process_type, stage))
            .collect())
    }

    pub fn phase_for(
        action: HookAction,
        process_type: ProcessType,
        stage: BlueGreenStage,
    ) -> Option<HookPhase> {
        use BlueGreenStage::{Idle, Live};
        use HookAction::*;

        match process_type {
            ProcessType::Deploy => Some(match action {
                BeforeStop => HookPhase::DeployApplicationBeforeStop,
                AfterStop => HookPhase::DeployApplicationAfterStop,
                BeforeUnmapRoutes => HookPhase::DeployApplicationBeforeUnmapRoutes,
                BeforeStart => HookPhase::DeployApplicationBeforeStart,
            }),
            ProcessType::BlueGreenDeploy => match (action, stage) {
                (BeforeStop, Idle) => Some(HookPhase::BlueGreenApplicationBeforeStopIdle),
                (BeforeStop, Live) => Some(HookPhase::BlueGreenApplicationBeforeStopLive),
                (AfterStop, Idle) => Some(HookPhase::BlueGreenApplicationAfterStopIdle),
                (AfterStop, Live) => Some(HookPhase::BlueGreenApplicationAfterStopLive),
                // Routes of the idle generation are temporary.
                (BeforeUnmapRoutes, Idle) => None,
                (BeforeUnmapRoutes, Live) => {
                    Some(HookPhase::BlueGreenApplicationBeforeUnmapRoutesLive)
                }
                (BeforeStart, Idle) => Some(HookPhase::BlueGreenApplicationBeforeStartIdle),
                (BeforeStart, Live) => Some(HookPhase::BlueGreenApplicationBeforeStartLive),
            },
            ProcessType::Undeploy => match action {
                BeforeStop => Some(HookPhase::UndeployApplicationBeforeStop),
                AfterStop => Some(HookPhase::UndeployApplicationAfterStop),
                BeforeUnmapRoutes => Some(HookPhase::UndeployApplicationBeforeUnmapRoutes),
                BeforeStart => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_deploy_process() {
        let ctx = ProcessContext::new("proc-1", "space-1");
        let phases =
            HookPhaseBuilder::build(&ctx, &[HookAction::BeforeStop, HookAction::AfterStop])
                .unwrap();

        assert_eq!(
            phases,
            vec![
                HookPhase::DeployApplicationBeforeStop,
                HookPhase::DeployApplicationAfterStop
            ]
        );
    }

    #[test]
    fn test_blue_green_live_stage() {
        let mut ctx = ProcessContext::new("proc-1", "space-1");
        ctx.set(&PROCESS_TYPE, ProcessType::BlueGreenDeploy).unwrap();
        ctx.set(&BLUE_GREEN_STAGE, BlueGreenStage::Live).unwrap();

        let phases = HookPhaseBuilder::build(
            &ctx,
            &[HookAction::BeforeStop, HookAction::BeforeUnmapRoutes],
        )
        .unwrap();

        assert_eq!(
            phases,
            vec![
                HookPhase::BlueGreenApplicationBeforeStopLive,
                HookPhase::BlueGreenApplicationBeforeUnmapRoutesLive
            ]
        );
    }

    #[test]
    fn test_actions_without_phase_are_skipped() {
        assert_eq!(
            HookPhaseBuilder::phase_for(
                HookAction::BeforeUnmapRoutes,
                ProcessType::BlueGreenDeploy,
                BlueGreenStage::Idle
            ),
            None
        );
        assert_eq!(
            HookPhaseBuilder::phase_for(
                HookAction::BeforeStart,
                ProcessType::Undeploy,
                BlueGreenStage::Idle
            ),
            None
        );
    }
}
