pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod helper;
pub mod hooks;
pub mod platform;
pub mod polling;
pub mod runner;
pub mod sinks;
pub mod state_machine;
pub mod step;
pub mod steps;
pub mod store;
pub mod variables;

pub use cache::ExpiringCache;
pub use config::OrchestratorConfig;
pub use context::{ContextSnapshot, ProcessContext, Variable, VariableError};
pub use error::{OrchestratorError, Result};
pub use executor::StepExecutor;
pub use helper::StepHelper;
pub use hooks::{
    AfterStepHookPhaseProvider, BeforeStepHookPhaseProvider, HookAction, HookPhaseBuilder,
    HookTiming, HooksCalculator,
};
pub use platform::{PlatformClient, PlatformError, SimulatedPlatform};
pub use polling::{ItemPoller, ItemStatus, PollMany, PollingAggregator, PollingOutcome};
pub use runner::{HookRunner, LoggingHookRunner, ProcessRunner};
pub use sinks::{
    InMemoryProcessLogs, InMemoryProgressMessages, ProcessLogSink, ProgressMessageSink,
};
pub use state_machine::{StepPath, StepPhaseMachine};
pub use step::{AsyncExecution, AsyncStep, Step, StepKind, StepTimeout, SyncStep, TimeoutGuard};
pub use store::{ContextStore, DbContextStore, InMemoryContextStore};
