use serde::{Deserialize, Serialize};

/// Named extension point around an application lifecycle step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub enum HookPhase {
    #[serde(rename = "deploy.application.before-stop")]
    DeployApplicationBeforeStop,
    #[serde(rename = "deploy.application.after-stop")]
    DeployApplicationAfterStop,
    #[serde(rename = "deploy.application.before-unmap-routes")]
    DeployApplicationBeforeUnmapRoutes,
    #[serde(rename = "deploy.application.before-start")]
    DeployApplicationBeforeStart,
    #[serde(rename = "blue-green.application.before-stop.idle")]
    BlueGreenApplicationBeforeStopIdle,
    #[serde(rename = "blue-green.application.before-stop.live")]
    BlueGreenApplicationBeforeStopLive,
    #[serde(rename = "blue-green.application.after-stop.idle")]
    BlueGreenApplicationAfterStopIdle,
    #[serde(rename = "blue-green.application.after-stop.live")]
    BlueGreenApplicationAfterStopLive,
    #[serde(rename = "blue-green.application.before-unmap-routes.live")]
    BlueGreenApplicationBeforeUnmapRoutesLive,
    #[serde(rename = "blue-green.application.before-start.idle")]
    BlueGreenApplicationBeforeStartIdle,
    #[serde(rename = "blue-green.application.before-start.live")]
    BlueGreenApplicationBeforeStartLive,
    #[serde(rename = "undeploy.application.before-stop")]
    UndeployApplicationBeforeStop,
    #[serde(rename = "undeploy.application.after-stop")]
    UndeployApplicationAfterStop,
    #[serde(rename = "undeploy.application.before-unmap-routes")]
    UndeployApplicationBeforeUnmapRoutes,
}

impl HookPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeployApplicationBeforeStop => "deploy.application.before-stop",
            Self::DeployApplicationAfterStop => "deploy.application.after-stop",
            Self::DeployApplicationBeforeUnmapRoutes => "deploy.application.before-unmap-routes",
            Self::DeployApplicationBeforeStart => "deploy.application.before-start",
            Self::BlueGreenApplicationBeforeStopIdle => "blue-green.application.before-stop.idle",
            Self::BlueGreenApplicationBeforeStopLive => "blue-green.application.before-stop.live",
            Self::BlueGreenApplicationAfterStopIdle => "blue-green.application.after-stop.idle",
            Self::BlueGreenApplicationAfterStopLive => "blue-green.application.after-stop.live",
            Self::BlueGreenApplicationBeforeUnmapRoutesLive => {
                "blue-green.application.before-unmap-routes.live"
            }
            Self::BlueGreenApplicationBeforeStartIdle => "blue-green.application.before-start.idle",
            Self::BlueGreenApplicationBeforeStartLive => "blue-green.application.before-start.live",
            Self::UndeployApplicationBeforeStop => "undeploy.application.before-stop",
            Self::UndeployApplicationAfterStop => "undeploy.application.after-stop",
            Self::UndeployApplicationBeforeUnmapRoutes => "undeploy.application.before-unmap-routes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|phase| phase.as_str() == s)
    }

    pub const ALL: [HookPhase; 14] = [
        Self::DeployApplicationBeforeStop,
        Self::DeployApplicationAfterStop,
        Self::DeployApplicationBeforeUnmapRoutes,
        Self::DeployApplicationBeforeStart,
        Self::BlueGreenApplicationBeforeStopIdle,
        Self::BlueGreenApplicationBeforeStopLive,
        Self::BlueGreenApplicationAfterStopIdle,
        Self::BlueGreenApplicationAfterStopLive,
        Self::BlueGreenApplicationBeforeUnmapRoutesLive,
        Self::BlueGreenApplicationBeforeStartIdle,
        Self::BlueGreenApplicationBeforeStartLive,
        Self::UndeployApplicationBeforeStop,
        Self::UndeployApplicationAfterStop,
        Self::UndeployApplicationBeforeUnmapRoutes,
    ];
}

impl std::fmt::Display for HookPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of deployment process a step is running in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    #[default]
    Deploy,
    BlueGreenDeploy,
    Undeploy,
}

impl ProcessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::BlueGreenDeploy => "blue_green_deploy",
            Self::Undeploy => "undeploy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deploy" => Some(Self::Deploy),
            "blue_green_deploy" => Some(Self::BlueGreenDeploy),
            "undeploy" => Some(Self::Undeploy),
            _ => None,
        }
    }
}

/// Which of the two application generations a blue-green process is
/// currently working on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum BlueGreenStage {
    #[default]
    Idle,
    Live,
}

impl BlueGreenStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Live => "live",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "live" => Some(Self::Live),
            _ => None,
        }
    }
}

/// A hook declared by a module in the deployment descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Hook {
    pub name: String,
    /// Phase names as written in the descriptor. Unknown names are kept
    /// but never match a computed phase.
    pub phases: Vec<String>,
    pub command: Option<String>,
}

impl Hook {
    pub fn new(name: impl Into<String>, phases: &[HookPhase]) -> Self {
        Self {
            name: name.into(),
            phases: phases.iter().map(|p| p.as_str().to_string()).collect(),
            command: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn known_phases(&self) -> Vec<HookPhase> {
        self.phases
            .iter()
            .filter_map(|p| HookPhase::parse(p))
            .collect()
    }
}

/// Descriptor module being processed by the current step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Module {
    pub name: String,
    pub major_schema_version: u32,
    #[serde(default)]
    pub hooks: Vec<Hook>,
}

impl Module {
    /// Hooks only exist in descriptors from schema version 3 onwards.
    pub const MIN_HOOKS_SCHEMA_VERSION: u32 = 3;

    pub fn new(name: impl Into<String>, major_schema_version: u32) -> Self {
        Self {
            name: name.into(),
            major_schema_version,
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn supports_hooks(&self) -> bool {
        self.major_schema_version >= Self::MIN_HOOKS_SCHEMA_VERSION
    }
}
