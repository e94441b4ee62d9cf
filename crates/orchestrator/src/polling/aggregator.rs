use std::sync::Arc;

use deploy_core::AsyncExecutionState;
use tracing::{debug, warn};

use super::PollingOutcome;
use crate::context::ProcessContext;
use crate::error::Result;
use crate::step::AsyncExecution;
use crate::variables::PENDING_ASYNC_EXECUTIONS;

/// Combines the async executions of one step into a single verdict per tick.
///
/// Pending executions are tracked by index, so the list returned by
/// `AsyncStep::async_executions` has to keep its order between ticks.
pub struct PollingAggregator {
    executions: Vec<Arc<dyn AsyncExecution>>,
}

impl PollingAggregator {
    pub fn new(executions: Vec<Arc<dyn AsyncExecution>>) -> Self {
        Self { executions }
    }

    pub async fn poll(&self, ctx: &mut ProcessContext) -> Result<PollingOutcome> {
        let total = self.executions.len();
        if total == 0 {
            ctx.remove(&PENDING_ASYNC_EXECUTIONS);
            return Ok(PollingOutcome::resolve(0, 0, 0, None));
        }

        let pending = match ctx.get(&PENDING_ASYNC_EXECUTIONS)? {
            Some(pending) => pending,
            None => (0..total).collect(),
        };

        let mut still_running = Vec::new();
        let mut errored = 0;
        let mut error = None;
        let mut read_error = None;
        for (position, &index) in pending.iter().enumerate() {
            let Some(execution) = self.executions.get(index) else {
                warn!(index, total, "Dropping pending execution that no longer exists");
                continue;
            };
            let state = match execution.poll(ctx).await {
                Ok(state) => state,
                Err(e) => {
                    still_running.extend_from_slice(&pending[position..]);
                    read_error = Some(e);
                    break;
                }
            };
            match state {
                AsyncExecutionState::Running => still_running.push(index),
                AsyncExecutionState::Finished => {}
                AsyncExecutionState::Error => {
                    errored += 1;
                    if error.is_none() {
                        error = Some(execution.polling_error_message(ctx));
                    }
                }
            }
        }

        // Items resolved earlier in this tick stay pruned. A failed item
        // outranks the read error.
        if let Some(e) = read_error {
            if error.is_none() {
                ctx.set(&PENDING_ASYNC_EXECUTIONS, still_running)?;
                return Err(e);
            }
        }

        let finished = total.saturating_sub(still_running.len() + errored);
        ctx.logger().report_progress(finished, total);
        debug!(
            finished,
            total,
            running = still_running.len(),
            errored,
            "Polled async executions"
        );

        let outcome = PollingOutcome::resolve(still_running.len(), finished, total, error);
        if outcome.state == AsyncExecutionState::Running {
            ctx.set(&PENDING_ASYNC_EXECUTIONS, still_running)?;
        } else {
            ctx.remove(&PENDING_ASYNC_EXECUTIONS);
        }
        Ok(outcome)
    }
}
