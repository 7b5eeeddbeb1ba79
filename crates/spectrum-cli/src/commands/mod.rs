//! Command implementations for spectrumctl

pub mod caps;
pub mod control;
pub mod status;
pub mod watch;

pub use caps::caps;
pub use control::{pid, start, stop, terminate};
pub use status::status;
pub use watch::watch;
