use deploy_core::StepPhase;

use crate::error::{OrchestratorError, Result};

/// Which half of a step a tick runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPath {
    /// Start (or restart) the step: `execute_sync` / `execute_async`.
    Entry,
    /// Only check outstanding asynchronous work.
    Poll,
}

/// Phase transitions of a single step.
///
/// `None` is a step that was never entered. DONE left behind by the
/// previous step means the same thing for the next one.
pub struct StepPhaseMachine;

impl StepPhaseMachine {
    pub fn path_for(recorded: Option<StepPhase>, is_async: bool) -> StepPath {
        if is_async && !StepPhase::requires_entry(recorded) {
            StepPath::Poll
        } else {
            StepPath::Entry
        }
    }

    pub fn validate_transition(
        step: &str,
        from: Option<StepPhase>,
        to: StepPhase,
        is_async: bool,
    ) -> Result<()> {
        if Self::allowed_transitions(is_async).contains(&to) {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidPhase {
                step: step.to_string(),
                from: from.map_or("not entered", |p| p.as_str()).to_string(),
                to,
            })
        }
    }

    // Every phase is reachable from every recorded phase for async steps;
    // sync steps finish within the tick.
    fn allowed_transitions(is_async: bool) -> Vec<StepPhase> {
        if is_async {
            vec![StepPhase::Poll, StepPhase::Done, StepPhase::Retry]
        } else {
            vec![StepPhase::Done, StepPhase::Retry]
        }
    }

    pub fn can_transition(from: Option<StepPhase>, to: StepPhase, is_async: bool) -> bool {
        Self::validate_transition("", from, to, is_async).is_ok()
    }

    /// Whether the engine moves on to the next step after `phase`.
    pub fn is_terminal(phase: StepPhase) -> bool {
        phase == StepPhase::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_step_cannot_poll() {
        assert!(!StepPhaseMachine::can_transition(None, StepPhase::Poll, false));
        assert!(StepPhaseMachine::can_transition(None, StepPhase::Done, false));
        assert!(StepPhaseMachine::can_transition(
            Some(StepPhase::Retry),
            StepPhase::Retry,
            false
        ));
    }

    #[test]
    fn test_async_transitions() {
        assert!(StepPhaseMachine::can_transition(None, StepPhase::Poll, true));
        assert!(StepPhaseMachine::can_transition(
            Some(StepPhase::Poll),
            StepPhase::Poll,
            true
        ));
        assert!(StepPhaseMachine::can_transition(
            Some(StepPhase::Poll),
            StepPhase::Done,
            true
        ));
    }

    #[test]
    fn test_path_selection() {
        assert_eq!(StepPhaseMachine::path_for(None, true), StepPath::Entry);
        assert_eq!(
            StepPhaseMachine::path_for(Some(StepPhase::Poll), true),
            StepPath::Poll
        );
        assert_eq!(
            StepPhaseMachine::path_for(Some(StepPhase::Retry), true),
            StepPath::Entry
        );
        assert_eq!(
            StepPhaseMachine::path_for(Some(StepPhase::Poll), false),
            StepPath::Entry
        );
    }

    #[test]
    fn test_invalid_phase_error() {
        let error =
            StepPhaseMachine::validate_transition("stopApp", None, StepPhase::Poll, false)
                .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Step \"stopApp\" returned phase POLL which is not allowed after not entered"
        );
    }

    #[test]
    fn test_terminal() {
        assert!(StepPhaseMachine::is_terminal(StepPhase::Done));
        assert!(!StepPhaseMachine::is_terminal(StepPhase::Poll));
    }
}
