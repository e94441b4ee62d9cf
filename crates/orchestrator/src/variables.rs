//! Declared process variables.
//!
//! These names are the contract between ticks: whatever a step needs after
//! returning POLL, or after a restart, lives under one of them.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use deploy_core::{BlueGreenStage, ErrorType, Hook, Module, ProcessType, StepPhase};
use uuid::Uuid;

use crate::context::Variable;
use crate::platform::{ServiceOperationType, TaskSpec};

// Framework
pub static STEP_PHASE: Variable<StepPhase> = Variable::new("stepPhase");
pub static ERROR_TYPE: Variable<ErrorType> = Variable::new("errorType");
pub static PROCESS_ABORTED: Variable<bool> = Variable::new("processAborted");
pub static PENDING_ASYNC_EXECUTIONS: Variable<Vec<usize>> =
    Variable::new("pendingAsyncExecutions");
pub static HOOKS_FOR_EXECUTION: Variable<Vec<Hook>> = Variable::new("hooksForExecution");
pub static CURRENT_STEP_INDEX: Variable<i64> = Variable::new("currentStepIndex");
pub static STEP_RETRY_COUNT: Variable<i64> = Variable::new("stepRetryCount");

// Deployment
pub static MODULE_TO_DEPLOY: Variable<Module> = Variable::new("moduleToDeploy");
pub static PROCESS_TYPE: Variable<ProcessType> = Variable::new("processType");
pub static BLUE_GREEN_STAGE: Variable<BlueGreenStage> = Variable::new("blueGreenStage");
pub static APP_TO_PROCESS: Variable<String> = Variable::new("appToProcess");
pub static USES_CUSTOM_ROUTES: Variable<bool> = Variable::new("usesCustomRoutes");

// Tasks
pub static TASK_TO_EXECUTE: Variable<TaskSpec> = Variable::new("taskToExecute");
pub static STARTED_TASK_GUID: Variable<Uuid> = Variable::new("startedTaskGuid");
pub static TASK_EXECUTION_TIMEOUT: Variable<Duration> = Variable::new("taskExecutionTimeout");

// Services
pub static TRIGGERED_SERVICE_OPERATIONS: Variable<BTreeMap<String, ServiceOperationType>> =
    Variable::new("triggeredServiceOperations");
pub static SERVICES_TO_POLL: Variable<Vec<String>> = Variable::new("servicesToPoll");
pub static SERVICE_POLLING_ERROR: Variable<String> = Variable::new("servicePollingError");
pub static SERVICE_OPERATIONS_TIMEOUT: Variable<Duration> =
    Variable::new("serviceOperationsTimeout");

/// Time the step named `step` was first entered.
pub fn step_start_time(step: &str) -> Variable<DateTime<Utc>> {
    Variable::dynamic(format!("stepStartTime.{step}"))
}

/// Hook name to the phases it already ran for, per module.
pub fn executed_hooks_for_module(module: &str) -> Variable<BTreeMap<String, Vec<String>>> {
    Variable::dynamic(format!("executedHooksForModule.{module}"))
}
