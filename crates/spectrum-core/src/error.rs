//! Error types shared by drivers, the retry executor and the scan engine

use thiserror::Error;

/// Result type for raw driver calls
pub type DriverResult<T> = Result<T, DriverError>;

/// Result type for scan engine operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Failure reported by a single device call.
///
/// These are the errors the retry executor retries; a driver returns one for
/// every call that did not complete.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DriverError {
    /// Device did not answer in time
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Device answered with an error status
    #[error("Device rejected call: {0}")]
    Rejected(String),

    /// Link to the device is down
    #[error("Device not connected")]
    NotConnected,

    /// Transport level I/O failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Device does not support the requested call
    #[error("Not supported: {0}")]
    NotSupported(String),
}

/// Device failure that survived the retry policy
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeviceError {
    /// Every attempt allowed by the policy failed
    #[error("Device error in {operation}: {message} (tried {attempts} time{})", plural(.attempts))]
    Exhausted {
        /// Name of the failing call
        operation: String,
        /// Number of attempts made
        attempts: u32,
        /// Message from the last failure
        message: String,
    },

    /// Device could not be opened
    #[error("Failed to open device: {0}")]
    Open(String),

    /// No driver is registered for the device type
    #[error("Unknown device type: {0}")]
    UnknownDevice(String),
}

/// Configuration does not fit the device it was handed to
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// No configuration document with this id
    #[error("Configuration not found: {0}")]
    NotFound(String),

    /// Document exists but is not readable
    #[error("Invalid configuration {id}: {message}")]
    Invalid { id: String, message: String },

    /// Configuration has no section for this device type
    #[error("Configuration {id} has no settings for device '{device}'")]
    MissingDevice { id: String, device: String },

    /// Malformed scan parameters
    #[error("Invalid scan parameters: {0}")]
    BadScan(String),

    /// Setting name the device does not know
    #[error("Unknown setting '{0}'")]
    UnknownSetting(String),

    /// Setting value outside the capability domain
    #[error("Value {value} not allowed for '{setting}'")]
    OutOfDomain { setting: String, value: String },

    /// Mode the device does not offer
    #[error("Unsupported mode '{0}'")]
    UnsupportedMode(String),
}

/// Failure that ends a scan episode
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScanError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Spectrum data could not be persisted
    #[error("Data sink error: {0}")]
    Sink(String),
}

fn plural(n: &u32) -> &'static str {
    if *n == 1 {
        ""
    } else {
        "s"
    }
}
