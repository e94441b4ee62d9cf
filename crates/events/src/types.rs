//! Event types emitted while steps execute

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct EventEnvelope {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: Event,
}

impl EventEnvelope {
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// All possible events in the system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A step was entered through its entry point
    #[serde(rename = "step.started")]
    StepStarted {
        process_id: String,
        task_id: String,
        step: String,
    },

    /// The phase returned by a tick was recorded
    #[serde(rename = "step.phase_recorded")]
    StepPhaseRecorded {
        process_id: String,
        task_id: String,
        step: String,
        phase: String,
    },

    /// Aggregated polling progress after one tick
    #[serde(rename = "step.polling_progress")]
    PollingProgress {
        process_id: String,
        task_id: String,
        finished: usize,
        total: usize,
    },

    /// Hooks were selected to run around a step
    #[serde(rename = "step.hooks_scheduled")]
    HooksScheduled {
        process_id: String,
        task_id: String,
        timing: String,
        hooks: Vec<String>,
    },

    /// A step failed and was classified
    #[serde(rename = "step.failed")]
    StepFailed {
        process_id: String,
        task_id: String,
        error_type: String,
        message: String,
    },

    /// The abort flag was observed before a step
    #[serde(rename = "process.aborted")]
    ProcessAborted { process_id: String, task_id: String },

    /// Error outside of any step
    #[serde(rename = "error")]
    Error {
        message: String,
        context: Option<String>,
    },
}

impl Event {
    /// Get the process ID associated with this event, if any
    pub fn process_id(&self) -> Option<&str> {
        match self {
            Event::StepStarted { process_id, .. }
            | Event::StepPhaseRecorded { process_id, .. }
            | Event::PollingProgress { process_id, .. }
            | Event::HooksScheduled { process_id, .. }
            | Event::StepFailed { process_id, .. }
            | Event::ProcessAborted { process_id, .. } => Some(process_id),
            Event::Error { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::StepFailed { .. } | Event::ProcessAborted { .. } | Event::Error { .. }
        )
    }
}
