//! Worker errors

use std::io;

use spectrum_control::ProcessError;
use thiserror::Error;

/// Failure that stops a worker
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Signal listeners could not be installed
    #[error("Failed to install signal handlers: {0}")]
    Signals(#[source] io::Error),

    /// `start` was called before `init`
    #[error("Worker not initialised")]
    NotInitialised,
}
