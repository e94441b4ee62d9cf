//! Hook phases woven in around steps.
//!
//! A step opts into hooks by exposing one or both provider capabilities.
//! Providers are pure functions of the context: for a fixed context they
//! return the same phases in the same order. Running the hooks themselves is
//! left to whoever drives the process.

mod builder;
mod calculator;

use deploy_core::HookPhase;

use crate::context::ProcessContext;
use crate::error::Result;

pub use builder::{HookAction, HookPhaseBuilder};
pub use calculator::HooksCalculator;

pub trait BeforeStepHookPhaseProvider: Send + Sync {
    fn hooks_before(&self, ctx: &ProcessContext) -> Result<Vec<HookPhase>>;
}

pub trait AfterStepHookPhaseProvider: Send + Sync {
    fn hooks_after(&self, ctx: &ProcessContext) -> Result<Vec<HookPhase>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookTiming {
    Before,
    After,
}

impl HookTiming {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}
