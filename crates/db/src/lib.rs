mod error;
pub mod models;
mod pool;
pub mod repositories;

pub use error::*;
pub use models::{
    ProcessContextRow, ProcessLogRow, ProgressMessageRow, StoredContext, StoredLogLine,
};
pub use pool::*;
pub use repositories::*;
