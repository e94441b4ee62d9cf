use std::collections::BTreeMap;

use deploy_core::{Hook, HookPhase, Module};

use crate::context::ProcessContext;
use crate::error::Result;
use crate::variables::executed_hooks_for_module;

/// Selects the hooks of a module that still have to run for a set of phases.
///
/// Executed phases are remembered per module and hook, so re-entering a
/// step (after RETRY or a restart) does not run the same hook twice for the
/// same phase.
pub struct HooksCalculator;

impl HooksCalculator {
    /// Hooks in descriptor order.
    pub fn hooks_for_execution(
        ctx: &ProcessContext,
        module: &Module,
        phases: &[HookPhase],
    ) -> Result<Vec<Hook>> {
        if !module.supports_hooks() || phases.is_empty() {
            return Ok(Vec::new());
        }

        let executed = ctx.get_or(&executed_hooks_for_module(&module.name), BTreeMap::new())?;
        Ok(module
            .hooks
            .iter()
            .filter(|hook| !Self::pending_phases(hook, phases, executed.get(&hook.name)).is_empty())
            .cloned()
            .collect())
    }

    /// Record that `hooks` ran for their phases among `phases`.
    pub fn record_executed(
        ctx: &mut ProcessContext,
        module: &Module,
        hooks: &[Hook],
        phases: &[HookPhase],
    ) -> Result<()> {
        if hooks.is_empty() {
            return Ok(());
        }

        let variable = executed_hooks_for_module(&module.name);
        let mut executed = ctx.get_or(&variable, BTreeMap::new())?;
        for hook in hooks {
            let pending = Self::pending_phases(hook, phases, executed.get(&hook.name));
            let entry = executed.entry(hook.name.clone()).or_default();
            entry.extend(pending.iter().map(|p| p.as_str().to_string()));
        }
        ctx.set(&variable, executed)?;
        Ok(())
    }

    fn pending_phases(
        hook: &Hook,
        phases: &[HookPhase],
        executed: Option<&Vec<String>>,
    ) -> Vec<HookPhase> {
        hook.known_phases()
            .into_iter()
            .filter(|phase| phases.contains(phase))
            .filter(|phase| {
                executed.map_or(true, |done| !done.iter().any(|p| p == phase.as_str()))
            })
            .collect()
    }
}
