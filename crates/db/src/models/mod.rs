mod process_context;
mod process_log;
mod progress_message;

pub use process_context::*;
pub use process_log::*;
pub use progress_message::*;

use chrono::{DateTime, TimeZone, Utc};

pub(crate) fn millis_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ts).single().unwrap_or_default()
}

pub fn datetime_to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}
