use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{CloudTask, PlatformClient, PlatformError, ServiceOperation, TaskSpec, TaskState};

/// Scripted in-memory platform.
///
/// Status reads walk through the scripted states one call at a time and
/// then keep answering the last one. Every call is counted.
#[derive(Debug, Default)]
pub struct SimulatedPlatform {
    state: Mutex<SimulatedState>,
}

#[derive(Debug, Default)]
struct SimulatedState {
    applications: HashMap<String, Uuid>,
    task_scripts: HashMap<String, VecDeque<TaskState>>,
    started_tasks: HashMap<Uuid, String>,
    service_scripts: HashMap<String, VecDeque<ServiceOperation>>,
    failures: HashMap<&'static str, VecDeque<PlatformError>>,
    calls: HashMap<&'static str, usize>,
    stopped: Vec<String>,
    unmapped: Vec<String>,
}

impl SimulatedState {
    fn record(&mut self, call: &'static str) -> Result<(), PlatformError> {
        *self.calls.entry(call).or_default() += 1;
        match self.failures.get_mut(call).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn next_scripted<T: Clone>(script: &mut VecDeque<T>) -> Option<T> {
    if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    }
}

impl SimulatedPlatform {
    pub const GET_APPLICATION_GUID: &'static str = "get_application_guid";
    pub const START_TASK: &'static str = "start_task";
    pub const GET_TASK: &'static str = "get_task";
    pub const GET_SERVICE_LAST_OPERATION: &'static str = "get_service_last_operation";
    pub const STOP_APPLICATION: &'static str = "stop_application";
    pub const UNMAP_ROUTES: &'static str = "unmap_routes";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_application(mut self, name: impl Into<String>) -> Self {
        self.state
            .get_mut()
            .applications
            .insert(name.into(), Uuid::new_v4());
        self
    }

    /// States returned by successive `get_task` calls for tasks named `task_name`.
    pub fn with_task_script(mut self, task_name: impl Into<String>, states: &[TaskState]) -> Self {
        self.state
            .get_mut()
            .task_scripts
            .insert(task_name.into(), states.iter().copied().collect());
        self
    }

    pub fn with_service_script(
        mut self,
        service_name: impl Into<String>,
        operations: Vec<ServiceOperation>,
    ) -> Self {
        self.state
            .get_mut()
            .service_scripts
            .insert(service_name.into(), operations.into());
        self
    }

    /// Make the next call of `call` fail with `error`.
    pub async fn fail_next(&self, call: &'static str, error: PlatformError) {
        self.state
            .lock()
            .await
            .failures
            .entry(call)
            .or_default()
            .push_back(error);
    }

    pub async fn call_count(&self, call: &'static str) -> usize {
        self.state.lock().await.calls.get(call).copied().unwrap_or(0)
    }

    pub async fn stopped_applications(&self) -> Vec<String> {
        self.state.lock().await.stopped.clone()
    }

    pub async fn unmapped_applications(&self) -> Vec<String> {
        self.state.lock().await.unmapped.clone()
    }
}

#[async_trait]
impl PlatformClient for SimulatedPlatform {
    async fn get_application_guid(&self, app_name: &str) -> Result<Uuid, PlatformError> {
        let mut state = self.state.lock().await;
        state.record(Self::GET_APPLICATION_GUID)?;
        state
            .applications
            .get(app_name)
            .copied()
            .ok_or_else(|| PlatformError::not_found("application", app_name))
    }

    async fn start_task(&self, app_guid: Uuid, task: &TaskSpec) -> Result<CloudTask, PlatformError> {
        let mut state = self.state.lock().await;
        state.record(Self::START_TASK)?;
        if !state.applications.values().any(|guid| *guid == app_guid) {
            return Err(PlatformError::not_found("application", app_guid.to_string()));
        }

        let guid = Uuid::new_v4();
        state.started_tasks.insert(guid, task.name.clone());
        debug!(task = %task.name, %guid, "Simulated task started");

        Ok(CloudTask {
            guid,
            name: task.name.clone(),
            state: TaskState::Pending,
            failure_reason: None,
        })
    }

    async fn get_task(&self, task_guid: Uuid) -> Result<CloudTask, PlatformError> {
        let mut state = self.state.lock().await;
        state.record(Self::GET_TASK)?;
        let name = state
            .started_tasks
            .get(&task_guid)
            .cloned()
            .ok_or_else(|| PlatformError::not_found("task", task_guid.to_string()))?;

        let task_state = state
            .task_scripts
            .get_mut(&name)
            .and_then(next_scripted)
            .unwrap_or(TaskState::Succeeded);
        let failure_reason =
            (task_state == TaskState::Failed).then(|| "Exited with status 1".to_string());

        Ok(CloudTask {
            guid: task_guid,
            name,
            state: task_state,
            failure_reason,
        })
    }

    async fn get_service_last_operation(
        &self,
        service_name: &str,
    ) -> Result<Option<ServiceOperation>, PlatformError> {
        let mut state = self.state.lock().await;
        state.record(Self::GET_SERVICE_LAST_OPERATION)?;
        match state.service_scripts.get_mut(service_name) {
            Some(script) => Ok(next_scripted(script)),
            None => Err(PlatformError::not_found("service", service_name)),
        }
    }

    async fn stop_application(&self, app_name: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        state.record(Self::STOP_APPLICATION)?;
        if !state.applications.contains_key(app_name) {
            return Err(PlatformError::not_found("application", app_name));
        }
        state.stopped.push(app_name.to_string());
        Ok(())
    }

    async fn unmap_routes(&self, app_name: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        state.record(Self::UNMAP_ROUTES)?;
        if !state.applications.contains_key(app_name) {
            return Err(PlatformError::not_found("application", app_name));
        }
        state.unmapped.push(app_name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{ServiceOperationState, ServiceOperationType};

    #[tokio::test]
    async fn test_task_script_is_sticky_at_the_end() {
        let platform = SimulatedPlatform::new()
            .with_application("web")
            .with_task_script("migrate", &[TaskState::Running, TaskState::Succeeded]);

        let app = platform.get_application_guid("web").await.unwrap();
        let task = platform
            .start_task(app, &TaskSpec::new("migrate", "bin/migrate"))
            .await
            .unwrap();

        assert_eq!(platform.get_task(task.guid).await.unwrap().state, TaskState::Running);
        assert_eq!(platform.get_task(task.guid).await.unwrap().state, TaskState::Succeeded);
        assert_eq!(platform.get_task(task.guid).await.unwrap().state, TaskState::Succeeded);
        assert_eq!(platform.call_count(SimulatedPlatform::GET_TASK).await, 3);
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed_once() {
        let platform = SimulatedPlatform::new().with_service_script(
            "db",
            vec![ServiceOperation::new(
                ServiceOperationType::Create,
                ServiceOperationState::Succeeded,
            )],
        );
        platform
            .fail_next(
                SimulatedPlatform::GET_SERVICE_LAST_OPERATION,
                PlatformError::Unavailable("maintenance".to_string()),
            )
            .await;

        assert!(platform.get_service_last_operation("db").await.is_err());
        assert!(platform.get_service_last_operation("db").await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_application() {
        let platform = SimulatedPlatform::new();
        assert_eq!(
            platform.stop_application("web").await,
            Err(PlatformError::not_found("application", "web"))
        );
    }
}
