//! Shared data models for spectrum workers

mod capability;
mod config;
mod status;

pub use capability::*;
pub use config::*;
pub use status::*;
