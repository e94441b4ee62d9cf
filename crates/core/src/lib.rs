//! Domain types shared by the deployment orchestrator crates.

pub mod domain;
mod error;

pub use domain::*;
pub use error::*;
