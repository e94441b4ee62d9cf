use serde::{Deserialize, Serialize};

/// Outcome of one invocation of a step.
///
/// There is no "running" phase: a step whose platform work is still
/// outstanding keeps answering `Poll`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepPhase {
    /// Step finished, the engine advances to the next step.
    Done,
    /// Asynchronous work is outstanding, the same step is polled again.
    Poll,
    /// A recoverable failure occurred, the step is re-entered from the start.
    Retry,
}

impl StepPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "DONE",
            Self::Poll => "POLL",
            Self::Retry => "RETRY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DONE" => Some(Self::Done),
            "POLL" => Some(Self::Poll),
            "RETRY" => Some(Self::Retry),
            _ => None,
        }
    }

    /// Whether the step must be re-entered through its entry point
    /// (as opposed to its polling path) on the next tick.
    pub fn requires_entry(phase: Option<Self>) -> bool {
        !matches!(phase, Some(Self::Poll))
    }
}

impl std::fmt::Display for StepPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one outstanding platform operation, as seen by a single poll.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AsyncExecutionState {
    Running,
    Finished,
    Error,
}

impl AsyncExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RUNNING" => Some(Self::Running),
            "FINISHED" => Some(Self::Finished),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Running)
    }
}
