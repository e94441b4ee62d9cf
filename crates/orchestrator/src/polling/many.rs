use async_trait::async_trait;
use deploy_core::AsyncExecutionState;
use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::PollingOutcome;
use crate::context::{ProcessContext, Variable};
use crate::error::Result;

/// Status of one item as reported by an [`ItemPoller`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    InProgress,
    Succeeded,
    Failed(String),
}

/// Reads the status of a single item. Must be safe to call repeatedly.
#[async_trait]
pub trait ItemPoller<T: Sync>: Send + Sync {
    async fn poll_item(&self, item: &T) -> Result<ItemStatus>;
}

/// Poll-many, prune-finished, aggregate.
///
/// The pending items live in `pending`; when it is not set yet, every item
/// passed to [`PollMany::poll`] is pending. Items are polled concurrently,
/// at most `concurrency` at a time, and all requests finish before `poll`
/// returns.
pub struct PollMany<'a, T> {
    pending: &'a Variable<Vec<T>>,
    concurrency: usize,
    label: &'static str,
}

impl<'a, T> PollMany<'a, T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    pub fn new(pending: &'a Variable<Vec<T>>, concurrency: usize) -> Self {
        Self {
            pending,
            concurrency: concurrency.max(1),
            label: "items",
        }
    }

    /// Noun used in the progress message, e.g. "service operations".
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub async fn poll<P>(
        &self,
        ctx: &mut ProcessContext,
        poller: &P,
        all_items: Vec<T>,
    ) -> Result<PollingOutcome>
    where
        P: ItemPoller<T>,
    {
        let total = all_items.len();
        let pending = match ctx.get(self.pending)? {
            Some(pending) => pending,
            None => all_items,
        };

        let requests: Vec<_> = pending.iter().map(|item| poller.poll_item(item)).collect();
        let results: Vec<Result<ItemStatus>> = stream::iter(requests)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut still_pending = Vec::new();
        let mut failed = 0;
        let mut error = None;
        let mut read_error = None;
        for (item, result) in pending.iter().zip(results) {
            let status = match result {
                Ok(status) => status,
                Err(e) => {
                    still_pending.push(item.clone());
                    read_error.get_or_insert(e);
                    continue;
                }
            };
            match status {
                ItemStatus::InProgress => still_pending.push(item.clone()),
                ItemStatus::Succeeded => {}
                ItemStatus::Failed(message) => {
                    failed += 1;
                    error.get_or_insert(message);
                }
            }
        }

        // Items resolved in this tick stay pruned. A failed item outranks
        // the read error.
        if let Some(e) = read_error {
            if error.is_none() {
                ctx.set(self.pending, still_pending)?;
                return Err(e);
            }
        }

        let finished = total.saturating_sub(still_pending.len() + failed);
        ctx.logger()
            .info(format!("{finished}/{total} {} finished", self.label));
        debug!(
            variable = self.pending.name(),
            finished,
            total,
            pending = still_pending.len(),
            "Polled items"
        );

        let outcome = PollingOutcome::resolve(still_pending.len(), finished, total, error);
        if outcome.state == AsyncExecutionState::Running {
            ctx.set(self.pending, still_pending)?;
        } else {
            ctx.remove(self.pending);
        }
        Ok(outcome)
    }
}
