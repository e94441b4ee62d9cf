//! Deployment steps built on the step framework.

mod poll_service_operations;
mod run_task;
mod stop_application;
mod unmap_routes;

pub use poll_service_operations::{PollServiceOperationsExecution, PollServiceOperationsStep};
pub use run_task::{PollTaskExecution, RunTaskStep};
pub use stop_application::StopApplicationStep;
pub use unmap_routes::UnmapRoutesStep;
