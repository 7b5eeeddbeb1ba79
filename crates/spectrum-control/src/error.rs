//! Control plane errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Problem with a worker's process artifacts
#[derive(Debug, Error)]
pub enum ProcessError {
    /// A live process already owns the PID file
    #[error("Process already exists: {0}")]
    AlreadyRunning(u32),

    /// PID file exists but could not be read or written
    #[error("Can not open PID file {path}: {source}")]
    PidFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// PID file does not hold a usable process id
    #[error("Bad PID: {0}")]
    BadPid(String),

    /// PID file names a process that no longer exists
    #[error("Bad PID (ESRCH): {0}")]
    NotRunning(u32),

    /// Config file exists but could not be read
    #[error("Can not read config file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Status file could not be read or parsed
    #[error("Bad status file {path}: {message}")]
    StatusFile { path: PathBuf, message: String },
}

impl ProcessError {
    /// Left behind by a worker that is gone; safe to replace
    pub fn is_stale(&self) -> bool {
        matches!(self, ProcessError::BadPid(_) | ProcessError::NotRunning(_))
    }
}

/// Failure to deliver a command to a worker
#[derive(Debug, Error)]
pub enum ControlError {
    /// Writing a control file failed
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Signal could not be delivered
    #[error("Failed to send {signal} to process {pid}: {source}")]
    Signal {
        pid: u32,
        signal: &'static str,
        #[source]
        source: io::Error,
    },
}

impl ControlError {
    /// The target process exited before the signal reached it (`ESRCH`)
    pub fn is_gone(&self) -> bool {
        match self {
            ControlError::Signal { source, .. } => source.raw_os_error() == Some(libc::ESRCH),
            _ => false,
        }
    }
}
