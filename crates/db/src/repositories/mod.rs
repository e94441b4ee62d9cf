mod process_context_repository;
mod process_log_repository;
mod progress_message_repository;

pub use process_context_repository::*;
pub use process_log_repository::*;
pub use progress_message_repository::*;
