//! Polling of outstanding asynchronous work.
//!
//! Both utilities here keep the set of not-yet-resolved items in a process
//! variable and drop items from it as soon as they resolve, so an item seen
//! FINISHED or ERROR is never polled again and the aggregate never regresses.

mod aggregator;
mod many;

use deploy_core::{AsyncExecutionState, StepPhase};

use crate::error::{OrchestratorError, Result};

pub use aggregator::PollingAggregator;
pub use many::{ItemPoller, ItemStatus, PollMany};

/// Aggregate result of one polling tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingOutcome {
    pub state: AsyncExecutionState,
    pub finished: usize,
    pub total: usize,
    /// Diagnostic of the first item that reported ERROR.
    pub error: Option<String>,
}

impl PollingOutcome {
    pub(crate) fn resolve(
        still_running: usize,
        finished: usize,
        total: usize,
        error: Option<String>,
    ) -> Self {
        let state = if error.is_some() {
            AsyncExecutionState::Error
        } else if still_running > 0 {
            AsyncExecutionState::Running
        } else {
            AsyncExecutionState::Finished
        };
        Self {
            state,
            finished,
            total,
            error,
        }
    }

    /// RUNNING keeps polling, FINISHED completes the step, ERROR fails it.
    pub fn into_phase(self) -> Result<StepPhase> {
        match self.state {
            AsyncExecutionState::Running => Ok(StepPhase::Poll),
            AsyncExecutionState::Finished => Ok(StepPhase::Done),
            AsyncExecutionState::Error => Err(OrchestratorError::PollingFailed(
                self.error
                    .unwrap_or_else(|| "Asynchronous operation failed".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_wins_over_running() {
        let outcome = PollingOutcome::resolve(2, 0, 3, Some("boom".to_string()));
        assert_eq!(outcome.state, AsyncExecutionState::Error);
        assert!(matches!(
            outcome.into_phase(),
            Err(OrchestratorError::PollingFailed(message)) if message == "boom"
        ));
    }

    #[test]
    fn test_finished_only_when_nothing_runs() {
        assert_eq!(
            PollingOutcome::resolve(1, 2, 3, None).into_phase().unwrap(),
            StepPhase::Poll
        );
        assert_eq!(
            PollingOutcome::resolve(0, 3, 3, None).into_phase().unwrap(),
            StepPhase::Done
        );
    }
}
