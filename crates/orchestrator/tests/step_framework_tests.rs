use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use deploy_core::{AsyncExecutionState, ErrorType, HookPhase, ProgressMessageType, StepPhase};
use events::{Event, EventBus};
use orchestrator::platform::{TaskSpec, TaskState};
use orchestrator::steps::{RunTaskStep, StopApplicationStep, UnmapRoutesStep};
use orchestrator::variables::{
    step_start_time, APP_TO_PROCESS, ERROR_TYPE, PROCESS_ABORTED, STARTED_TASK_GUID, STEP_PHASE,
    TASK_EXECUTION_TIMEOUT, TASK_TO_EXECUTE, USES_CUSTOM_ROUTES,
};
use orchestrator::{
    AsyncExecution, AsyncStep, InMemoryProcessLogs, InMemoryProgressMessages, OrchestratorConfig,
    OrchestratorError, ProcessContext, Result, SimulatedPlatform, Step, StepExecutor, StepHelper,
    StepKind, SyncStep, TimeoutGuard, Variable,
};

struct Harness {
    executor: StepExecutor,
    progress: Arc<InMemoryProgressMessages>,
    bus: EventBus,
}

fn harness() -> Harness {
    let progress = Arc::new(InMemoryProgressMessages::new());
    let logs = Arc::new(InMemoryProcessLogs::new());
    let bus = EventBus::new();
    let helper = StepHelper::new(progress.clone(), logs).with_event_bus(bus.clone());
    Harness {
        executor: StepExecutor::new(helper),
        progress,
        bus,
    }
}

fn task_context() -> ProcessContext {
    let mut ctx = ProcessContext::new("proc-1", "space-1");
    ctx.set(&APP_TO_PROCESS, "web".to_string())
        .expect("Failed to set app");
    ctx.set(&TASK_TO_EXECUTE, TaskSpec::new("migrate", "bin/migrate"))
        .expect("Failed to set task");
    ctx
}

fn run_task(platform: &Arc<SimulatedPlatform>) -> TimeoutGuard<RunTaskStep> {
    TimeoutGuard::new(RunTaskStep::new(
        platform.clone(),
        &OrchestratorConfig::default(),
    ))
}

/// Async execution answering from a fixed script, one state per poll.
struct ScriptedExecution {
    script: Mutex<VecDeque<AsyncExecutionState>>,
    polls: AtomicUsize,
    message: &'static str,
}

impl ScriptedExecution {
    fn new(script: &[AsyncExecutionState], message: &'static str) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.iter().copied().collect()),
            polls: AtomicUsize::new(0),
            message,
        })
    }

    fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AsyncExecution for ScriptedExecution {
    async fn poll(&self, _ctx: &mut ProcessContext) -> Result<AsyncExecutionState> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().expect("script lock poisoned");
        Ok(script.pop_front().unwrap_or(AsyncExecutionState::Running))
    }

    fn polling_error_message(&self, _ctx: &ProcessContext) -> String {
        self.message.to_string()
    }
}

static SCRIPT_TRIGGERED: Variable<bool> = Variable::new("scriptTriggered");

/// Async step over a fixed set of scripted executions.
struct ScriptedStep {
    executions: Vec<Arc<ScriptedExecution>>,
    triggers: AtomicUsize,
}

impl ScriptedStep {
    fn new(executions: Vec<Arc<ScriptedExecution>>) -> Self {
        Self {
            executions,
            triggers: AtomicUsize::new(0),
        }
    }
}

impl Step for ScriptedStep {
    fn name(&self) -> &str {
        "scripted"
    }

    fn kind(&self) -> StepKind<'_> {
        StepKind::Async(self)
    }
}

#[async_trait]
impl AsyncStep for ScriptedStep {
    async fn trigger(&self, ctx: &mut ProcessContext) -> Result<StepPhase> {
        if ctx.get(&SCRIPT_TRIGGERED)?.unwrap_or(false) {
            return Ok(StepPhase::Poll);
        }
        self.triggers.fetch_add(1, Ordering::SeqCst);
        ctx.set(&SCRIPT_TRIGGERED, true)?;
        Ok(StepPhase::Poll)
    }

    fn async_executions(&self, _ctx: &ProcessContext) -> Vec<Arc<dyn AsyncExecution>> {
        self.executions
            .iter()
            .map(|e| Arc::clone(e) as Arc<dyn AsyncExecution>)
            .collect()
    }
}

/// Sync step that counts invocations and fails with the given error.
struct FailingStep {
    calls: AtomicUsize,
    message: &'static str,
}

impl Step for FailingStep {
    fn name(&self) -> &str {
        "validateDescriptor"
    }

    fn kind(&self) -> StepKind<'_> {
        StepKind::Sync(self)
    }
}

#[async_trait]
impl SyncStep for FailingStep {
    async fn execute_sync(&self, _ctx: &mut ProcessContext) -> Result<StepPhase> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(OrchestratorError::content(self.message))
    }
}

mod idempotent_trigger {
    use super::*;

    #[tokio::test]
    async fn test_execute_async_twice_starts_task_once() {
        let platform = Arc::new(SimulatedPlatform::new().with_application("web"));
        let step = run_task(&platform);
        let mut ctx = task_context();

        let (first, executions) = step.execute_async(&mut ctx).await.unwrap();
        let (second, _) = step.execute_async(&mut ctx).await.unwrap();

        assert_eq!(first, StepPhase::Poll);
        assert_eq!(second, StepPhase::Poll);
        assert_eq!(executions.len(), 1);
        assert_eq!(platform.call_count(SimulatedPlatform::START_TASK).await, 1);
    }

    #[tokio::test]
    async fn test_scripted_step_triggers_once_across_entries() {
        let h = harness();
        let step = ScriptedStep::new(vec![ScriptedExecution::new(&[], "never")]);
        let mut ctx = ProcessContext::new("proc-1", "space-1");

        h.executor.execute(&step, &mut ctx).await.unwrap();
        ctx.set(&STEP_PHASE, StepPhase::Retry).unwrap();
        h.executor.execute(&step, &mut ctx).await.unwrap();

        assert_eq!(step.triggers.load(Ordering::SeqCst), 1);
    }
}

mod monotonic_aggregation {
    use super::*;
    use AsyncExecutionState::{Error, Finished, Running};

    #[tokio::test]
    async fn test_finished_execution_is_never_polled_again() {
        let h = harness();
        let first = ScriptedExecution::new(&[Running, Finished], "first failed");
        let second = ScriptedExecution::new(&[Running, Running, Finished], "second failed");
        let third = ScriptedExecution::new(&[Running, Running, Error], "third failed");
        let step = ScriptedStep::new(vec![first.clone(), second.clone(), third.clone()]);
        let mut ctx = ProcessContext::new("proc-1", "space-1");

        assert_eq!(
            h.executor.execute(&step, &mut ctx).await.unwrap(),
            StepPhase::Poll
        );
        assert_eq!(first.polls(), 0, "a triggering tick must not poll");

        assert_eq!(
            h.executor.execute(&step, &mut ctx).await.unwrap(),
            StepPhase::Poll
        );
        assert_eq!(
            h.executor.execute(&step, &mut ctx).await.unwrap(),
            StepPhase::Poll
        );
        let error = h.executor.execute(&step, &mut ctx).await.unwrap_err();

        assert_eq!(error.to_string(), "third failed");
        assert_eq!(first.polls(), 2);
        assert_eq!(second.polls(), 3);
        assert_eq!(third.polls(), 3);
        assert_eq!(ctx.get(&ERROR_TYPE).unwrap(), Some(ErrorType::UnknownError));
        assert_eq!(ctx.get(&STEP_PHASE).unwrap(), Some(StepPhase::Retry));
    }

    #[tokio::test]
    async fn test_progress_is_reported_every_tick() {
        let h = harness();
        let step = ScriptedStep::new(vec![
            ScriptedExecution::new(&[Finished], "a"),
            ScriptedExecution::new(&[Running, Finished], "b"),
        ]);
        let mut ctx = ProcessContext::new("proc-1", "space-1");

        for _ in 0..3 {
            h.executor.execute(&step, &mut ctx).await.unwrap();
        }

        assert_eq!(
            h.progress.texts_for("proc-1").await,
            vec!["1/2 finished", "2/2 finished"]
        );
    }
}

mod timeout_precedence {
    use super::*;

    #[tokio::test]
    async fn test_poll_past_deadline_fails_without_polling() {
        let h = harness();
        let platform = Arc::new(SimulatedPlatform::new().with_application("web"));
        let step = run_task(&platform);
        let mut ctx = task_context();
        ctx.set(&TASK_EXECUTION_TIMEOUT, Duration::from_secs(10))
            .unwrap();
        ctx.set(&STARTED_TASK_GUID, uuid::Uuid::new_v4()).unwrap();
        ctx.set(&STEP_PHASE, StepPhase::Poll).unwrap();
        ctx.set(
            &step_start_time(RunTaskStep::NAME),
            Utc::now() - chrono::Duration::seconds(11),
        )
        .unwrap();

        let error = h.executor.execute(&step, &mut ctx).await.unwrap_err();

        assert!(matches!(error, OrchestratorError::Timeout { .. }));
        assert_eq!(ctx.get(&ERROR_TYPE).unwrap(), Some(ErrorType::TimeoutError));
        assert_eq!(ctx.get(&STEP_PHASE).unwrap(), Some(StepPhase::Poll));
        assert_eq!(platform.call_count(SimulatedPlatform::GET_TASK).await, 0);
    }
}

mod abort_precedence {
    use super::*;

    #[tokio::test]
    async fn test_sync_step_body_is_not_invoked() {
        let h = harness();
        let step = FailingStep {
            calls: AtomicUsize::new(0),
            message: "unused",
        };
        let mut ctx = ProcessContext::new("proc-1", "space-1");
        ctx.set(&PROCESS_ABORTED, true).unwrap();

        let error = h.executor.execute(&step, &mut ctx).await.unwrap_err();

        assert!(matches!(error, OrchestratorError::Aborted));
        assert_eq!(step.calls.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.get(&ERROR_TYPE).unwrap(), Some(ErrorType::AbortError));
    }

    #[tokio::test]
    async fn test_async_step_is_neither_triggered_nor_polled() {
        let h = harness();
        let execution = ScriptedExecution::new(&[], "never");
        let step = ScriptedStep::new(vec![execution.clone()]);
        let mut ctx = ProcessContext::new("proc-1", "space-1");
        ctx.set(&PROCESS_ABORTED, true).unwrap();

        assert!(h.executor.execute(&step, &mut ctx).await.is_err());
        ctx.set(&STEP_PHASE, StepPhase::Poll).unwrap();
        assert!(h.executor.execute(&step, &mut ctx).await.is_err());

        assert_eq!(step.triggers.load(Ordering::SeqCst), 0);
        assert_eq!(execution.polls(), 0);
        assert_eq!(ctx.get(&ERROR_TYPE).unwrap(), Some(ErrorType::AbortError));
    }
}

mod hook_determinism {
    use super::*;
    use deploy_core::{BlueGreenStage, ProcessType};
    use orchestrator::variables::{BLUE_GREEN_STAGE, PROCESS_TYPE};
    use orchestrator::BeforeStepHookPhaseProvider;

    #[test]
    fn test_hooks_before_is_stable() {
        let platform = Arc::new(SimulatedPlatform::new());
        let step = UnmapRoutesStep::new(platform);
        let mut ctx = ProcessContext::new("proc-1", "space-1");
        ctx.set(&USES_CUSTOM_ROUTES, true).unwrap();

        let provider = step.before_hooks().expect("step exposes before hooks");
        let first = provider.hooks_before(&ctx).unwrap();
        for _ in 0..5 {
            assert_eq!(provider.hooks_before(&ctx).unwrap(), first);
        }
        assert_eq!(first, vec![HookPhase::DeployApplicationBeforeUnmapRoutes]);
    }

    #[test]
    fn test_blue_green_phases_follow_stage() {
        let step = StopApplicationStep::new(Arc::new(SimulatedPlatform::new()));
        let mut ctx = ProcessContext::new("proc-1", "space-1");
        ctx.set(&PROCESS_TYPE, ProcessType::BlueGreenDeploy).unwrap();
        ctx.set(&BLUE_GREEN_STAGE, BlueGreenStage::Idle).unwrap();

        let idle = step.hooks_before(&ctx).unwrap();
        ctx.set(&BLUE_GREEN_STAGE, BlueGreenStage::Live).unwrap();
        let live = step.hooks_before(&ctx).unwrap();

        assert_eq!(idle, vec![HookPhase::BlueGreenApplicationBeforeStopIdle]);
        assert_eq!(live, vec![HookPhase::BlueGreenApplicationBeforeStopLive]);
    }
}

mod end_to_end {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_task_run_poll_poll_done() {
        let h = harness();
        let mut rx = h.bus.subscribe_process("proc-1");
        let platform = Arc::new(
            SimulatedPlatform::new()
                .with_application("web")
                .with_task_script("migrate", &[TaskState::Running, TaskState::Succeeded]),
        );
        let step = run_task(&platform);
        let mut ctx = task_context();

        let mut phases = Vec::new();
        for _ in 0..3 {
            phases.push(h.executor.execute(&step, &mut ctx).await.unwrap());
        }

        assert_eq!(phases, vec![StepPhase::Poll, StepPhase::Poll, StepPhase::Done]);
        let finished: Vec<String> = h
            .progress
            .texts_for("proc-1")
            .await
            .into_iter()
            .filter(|text| text.ends_with("finished"))
            .collect();
        assert_eq!(finished, vec!["0/1 finished", "1/1 finished"]);
        assert!(!ctx.contains(&STARTED_TASK_GUID));
        assert!(!ctx.contains(&step_start_time(RunTaskStep::NAME)));
        assert_eq!(platform.call_count(SimulatedPlatform::START_TASK).await, 1);

        let first = rx.next().await.expect("event stream closed");
        assert!(matches!(first.event, Event::StepStarted { .. }));
    }

    #[tokio::test]
    async fn test_failed_task_surfaces_task_name() {
        let h = harness();
        let platform = Arc::new(
            SimulatedPlatform::new()
                .with_application("web")
                .with_task_script("migrate", &[TaskState::Failed]),
        );
        let step = run_task(&platform);
        let mut ctx = task_context();

        h.executor.execute(&step, &mut ctx).await.unwrap();
        let error = h.executor.execute(&step, &mut ctx).await.unwrap_err();

        assert_eq!(error.to_string(), "Execution of task \"migrate\" failed");
        assert_eq!(ctx.get(&STEP_PHASE).unwrap(), Some(StepPhase::Retry));

        // Re-entering after the failure starts a new task.
        h.executor.execute(&step, &mut ctx).await.unwrap();
        assert_eq!(platform.call_count(SimulatedPlatform::START_TASK).await, 2);
    }
}

mod classification {
    use super::*;

    #[tokio::test]
    async fn test_content_error_is_persisted_verbatim() {
        let h = harness();
        let mut rx = h.bus.subscribe();
        let step = FailingStep {
            calls: AtomicUsize::new(0),
            message: "Module \"web\" has no path",
        };
        let mut ctx = ProcessContext::new("proc-1", "space-1");

        let error = h.executor.execute(&step, &mut ctx).await.unwrap_err();

        assert!(matches!(error, OrchestratorError::Content(_)));
        assert_eq!(ctx.get(&ERROR_TYPE).unwrap(), Some(ErrorType::ContentError));

        let messages = h.progress.messages().await;
        let last = messages.last().expect("no progress message persisted");
        assert_eq!(last.message_type, ProgressMessageType::Error);
        assert_eq!(last.text, "Module \"web\" has no path");
        assert_eq!(last.task_id, "validateDescriptor");

        let mut failed = None;
        while let Ok(envelope) = rx.try_recv() {
            if let Event::StepFailed { error_type, .. } = envelope.event {
                failed = Some(error_type);
            }
        }
        assert_eq!(failed.as_deref(), Some("CONTENT_ERROR"));
    }

    #[tokio::test]
    async fn test_stale_error_type_is_cleared_on_success() {
        let h = harness();
        let platform = Arc::new(SimulatedPlatform::new().with_application("web"));
        let step = StopApplicationStep::new(platform);
        let mut ctx = task_context();
        ctx.set(&ERROR_TYPE, ErrorType::UnknownError).unwrap();

        h.executor.execute(&step, &mut ctx).await.unwrap();

        assert!(!ctx.contains(&ERROR_TYPE));
        assert_eq!(ctx.get(&STEP_PHASE).unwrap(), Some(StepPhase::Done));
    }
}
