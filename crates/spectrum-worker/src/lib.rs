//! spectrum-worker - Supervisor for a long-running device worker
//!
//! A [`ProcessSupervisor`] owns one device for the lifetime of the process.
//! It claims the worker's PID file, reacts to control signals, runs one scan
//! episode per requested configuration and publishes a status snapshot after
//! every sweep.

pub mod error;
pub mod signals;
pub mod store;
pub mod supervisor;

pub use error::WorkerError;
pub use signals::{ControlFlags, SignalAction, StopHandle};
pub use store::{ConfigSource, FsConfigStore, FsSpectrumStore};
pub use supervisor::ProcessSupervisor;
