mod error_type;
mod hook;
mod phase;
mod progress;

pub use error_type::*;
pub use hook::*;
pub use phase::*;
pub use progress::*;
