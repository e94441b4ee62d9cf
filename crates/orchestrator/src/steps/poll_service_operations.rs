use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deploy_core::{AsyncExecutionState, StepPhase};

use crate::config::OrchestratorConfig;
use crate::context::ProcessContext;
use crate::error::{OrchestratorError, Result};
use crate::platform::{
    PlatformClient, PlatformError, ServiceOperationState, ServiceOperationType,
};
use crate::polling::{ItemPoller, ItemStatus, PollMany};
use crate::step::{AsyncExecution, AsyncStep, Step, StepKind, StepTimeout};
use crate::variables::{
    SERVICES_TO_POLL, SERVICE_OPERATIONS_TIMEOUT, SERVICE_POLLING_ERROR,
    TRIGGERED_SERVICE_OPERATIONS,
};

/// Waits for the service operations recorded in
/// `triggeredServiceOperations` to leave the in-progress state.
pub struct PollServiceOperationsStep {
    platform: Arc<dyn PlatformClient>,
    concurrency: usize,
    default_timeout: Duration,
}

impl PollServiceOperationsStep {
    pub const NAME: &'static str = "pollServiceOperations";

    pub fn new(platform: Arc<dyn PlatformClient>, config: &OrchestratorConfig) -> Self {
        Self {
            platform,
            concurrency: config.polling_concurrency,
            default_timeout: config.default_step_timeout(),
        }
    }

    fn execution(&self) -> PollServiceOperationsExecution {
        PollServiceOperationsExecution {
            platform: Arc::clone(&self.platform),
            concurrency: self.concurrency,
        }
    }
}

impl Step for PollServiceOperationsStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> StepKind<'_> {
        StepKind::Async(self)
    }

    fn error_message(&self, _ctx: &ProcessContext) -> String {
        "Error monitoring operations on services".to_string()
    }
}

#[async_trait]
impl AsyncStep for PollServiceOperationsStep {
    async fn trigger(&self, ctx: &mut ProcessContext) -> Result<StepPhase> {
        let triggered = ctx.get_or(&TRIGGERED_SERVICE_OPERATIONS, BTreeMap::new())?;
        ctx.remove(&SERVICES_TO_POLL);
        ctx.remove(&SERVICE_POLLING_ERROR);

        if triggered.is_empty() {
            ctx.logger().debug("No service operations to wait for");
            return Ok(StepPhase::Done);
        }

        for (service, operation) in &triggered {
            ctx.logger()
                .info(format!("{} service \"{service}\"...", capitalize(operation.in_progress_verb())));
        }
        Ok(StepPhase::Poll)
    }

    fn async_executions(&self, _ctx: &ProcessContext) -> Vec<Arc<dyn AsyncExecution>> {
        vec![Arc::new(self.execution())]
    }

    /// The execution prunes per service and reports its own progress, so it
    /// is polled directly instead of through the aggregator.
    async fn poll(&self, ctx: &mut ProcessContext) -> Result<StepPhase> {
        let execution = self.execution();
        match execution.poll(ctx).await? {
            AsyncExecutionState::Running => Ok(StepPhase::Poll),
            AsyncExecutionState::Finished => Ok(StepPhase::Done),
            AsyncExecutionState::Error => Err(OrchestratorError::PollingFailed(
                execution.polling_error_message(ctx),
            )),
        }
    }
}

impl StepTimeout for PollServiceOperationsStep {
    fn timeout(&self, ctx: &ProcessContext) -> Result<Duration> {
        Ok(ctx
            .get(&SERVICE_OPERATIONS_TIMEOUT)?
            .unwrap_or(self.default_timeout))
    }
}

pub struct PollServiceOperationsExecution {
    platform: Arc<dyn PlatformClient>,
    concurrency: usize,
}

#[async_trait]
impl AsyncExecution for PollServiceOperationsExecution {
    async fn poll(&self, ctx: &mut ProcessContext) -> Result<AsyncExecutionState> {
        let triggered = ctx.get_or(&TRIGGERED_SERVICE_OPERATIONS, BTreeMap::new())?;
        let poller = ServiceOperationPoller {
            platform: self.platform.as_ref(),
            triggered: &triggered,
        };

        let outcome = PollMany::new(&SERVICES_TO_POLL, self.concurrency)
            .with_label("service operations")
            .poll(ctx, &poller, triggered.keys().cloned().collect())
            .await?;

        if let Some(error) = &outcome.error {
            ctx.set(&SERVICE_POLLING_ERROR, error.clone())?;
        }
        Ok(outcome.state)
    }

    fn polling_error_message(&self, ctx: &ProcessContext) -> String {
        match ctx.get(&SERVICE_POLLING_ERROR) {
            Ok(Some(message)) => message,
            _ => "Error polling service operations".to_string(),
        }
    }
}

struct ServiceOperationPoller<'a> {
    platform: &'a dyn PlatformClient,
    triggered: &'a BTreeMap<String, ServiceOperationType>,
}

#[async_trait]
impl ItemPoller<String> for ServiceOperationPoller<'_> {
    async fn poll_item(&self, service: &String) -> Result<ItemStatus> {
        let operation_type = self.triggered.get(service).copied();

        let operation = match self.platform.get_service_last_operation(service).await {
            Ok(operation) => operation,
            // A deleted service disappears once the delete completes.
            Err(PlatformError::NotFound { .. })
                if operation_type == Some(ServiceOperationType::Delete) =>
            {
                return Ok(ItemStatus::Succeeded);
            }
            Err(e) => return Err(e.into()),
        };

        let Some(operation) = operation else {
            return Ok(ItemStatus::Succeeded);
        };
        Ok(match operation.state {
            ServiceOperationState::InProgress => ItemStatus::InProgress,
            ServiceOperationState::Succeeded => ItemStatus::Succeeded,
            ServiceOperationState::Failed => ItemStatus::Failed(format!(
                "Error {} service \"{service}\": {}",
                operation.operation_type.in_progress_verb(),
                operation.description.as_deref().unwrap_or("no description")
            )),
        })
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{ServiceOperation, SimulatedPlatform};

    fn operation(state: ServiceOperationState) -> ServiceOperation {
        ServiceOperation::new(ServiceOperationType::Create, state)
    }

    fn context(services: &[(&str, ServiceOperationType)]) -> ProcessContext {
        let mut ctx = ProcessContext::new("proc-1", "space-1");
        let triggered = services
            .iter()
            .map(|(name, op)| (name.to_string(), *op))
            .collect();
        ctx.set(&TRIGGERED_SERVICE_OPERATIONS, triggered).unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_nothing_triggered_is_done() {
        let platform = Arc::new(SimulatedPlatform::new());
        let step = PollServiceOperationsStep::new(platform, &OrchestratorConfig::default());
        let mut ctx = ProcessContext::new("proc-1", "space-1");

        assert_eq!(step.trigger(&mut ctx).await.unwrap(), StepPhase::Done);
    }

    #[tokio::test]
    async fn test_finished_services_are_not_polled_again() {
        let platform = Arc::new(
            SimulatedPlatform::new()
                .with_service_script("db", vec![operation(ServiceOperationState::Succeeded)])
                .with_service_script(
                    "queue",
                    vec![
                        operation(ServiceOperationState::InProgress),
                        operation(ServiceOperationState::Succeeded),
                    ],
                ),
        );
        let step = PollServiceOperationsStep::new(platform.clone(), &OrchestratorConfig::default());
        let mut ctx = context(&[
            ("db", ServiceOperationType::Create),
            ("queue", ServiceOperationType::Create),
        ]);

        assert_eq!(step.trigger(&mut ctx).await.unwrap(), StepPhase::Poll);
        assert_eq!(step.poll(&mut ctx).await.unwrap(), StepPhase::Poll);
        assert_eq!(ctx.get(&SERVICES_TO_POLL).unwrap(), Some(vec!["queue".to_string()]));
        assert_eq!(step.poll(&mut ctx).await.unwrap(), StepPhase::Done);

        assert_eq!(
            platform
                .call_count(SimulatedPlatform::GET_SERVICE_LAST_OPERATION)
                .await,
            3
        );
        assert!(!ctx.contains(&SERVICES_TO_POLL));
    }

    #[tokio::test]
    async fn test_failed_operation_carries_description() {
        let platform = Arc::new(SimulatedPlatform::new().with_service_script(
            "db",
            vec![operation(ServiceOperationState::Failed).with_description("quota exceeded")],
        ));
        let step = PollServiceOperationsStep::new(platform, &OrchestratorConfig::default());
        let mut ctx = context(&[("db", ServiceOperationType::Create)]);
        step.trigger(&mut ctx).await.unwrap();

        let error = step.poll(&mut ctx).await.unwrap_err();

        assert_eq!(
            error.to_string(),
            "Error creating service \"db\": quota exceeded"
        );
    }

    #[tokio::test]
    async fn test_deleted_service_counts_as_finished() {
        let platform = Arc::new(SimulatedPlatform::new());
        let step = PollServiceOperationsStep::new(platform, &OrchestratorConfig::default());
        let mut ctx = context(&[("old-db", ServiceOperationType::Delete)]);
        step.trigger(&mut ctx).await.unwrap();

        assert_eq!(step.poll(&mut ctx).await.unwrap(), StepPhase::Done);
    }
}
