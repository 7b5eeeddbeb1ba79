//! spectrum-core - Core traits and types for spectrum scanning workers
//!
//! This crate holds everything a worker needs that does not touch the
//! process or the filesystem: the device driver abstraction, retry with
//! backoff, channelization and the scan engine that ties them together.

pub mod channel;
pub mod driver;
pub mod error;
pub mod models;
pub mod retry;
pub mod scan;
pub mod sink;

pub use channel::{ChannelPlan, ChannelWindow, EMPTY_CHANNEL};
pub use driver::{DeviceDriver, DeviceHandle, DeviceSettings, RawSample};
pub use error::{ConfigError, DeviceError, DriverError, DriverResult, ScanError, ScanResult};
pub use models::*;
pub use retry::{RetryExecutor, RetryPolicy, Tuning};
pub use scan::{CancelToken, ScanEngine, ScanOptions};
pub use sink::{NullSink, SpectrumSink};
