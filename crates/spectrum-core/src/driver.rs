//! DeviceDriver trait - the abstraction every device type implements
//!
//! A driver describes what its device can do ([`Capabilities`]) and opens a
//! [`DeviceHandle`] for one scan episode. The handle exposes the primitive
//! "apply a setting, take one reading" calls; retry, verification and
//! channelization are layered on top by the scan engine.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{DeviceError, DriverResult};
use crate::models::Capabilities;

/// Raw reading at one frequency
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    /// Frequency in Hz
    pub freq: f64,
    /// Amplitude (dBm or device units)
    pub amplitude: f64,
}

impl RawSample {
    pub fn new(freq: f64, amplitude: f64) -> Self {
        Self { freq, amplitude }
    }
}

/// Device-specific settings applied when the device is opened
pub type DeviceSettings = Map<String, Value>;

/// Factory for device handles of one device type
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    /// Device-type tag, as used in configuration documents
    fn device_type(&self) -> &str;

    /// Legal values for every configurable parameter
    fn capabilities(&self) -> Capabilities;

    /// Acquire the device for one scan episode
    async fn open(&self, settings: &DeviceSettings) -> Result<Box<dyn DeviceHandle>, DeviceError>;
}

/// An open device.
///
/// Calls take `&self`; implementations serialise access internally the way
/// transport adapters do. Every call may fail with a [`DriverError`], which
/// the retry executor retries according to the worker's policy.
///
/// [`DriverError`]: crate::error::DriverError
#[async_trait]
pub trait DeviceHandle: Send + Sync {
    /// Put the device into a demodulation mode
    async fn set_mode(&self, mode: &str) -> DriverResult<()>;

    /// Tune to a frequency
    async fn tune(&self, freq: f64) -> DriverResult<()>;

    /// Frequency the device reports it is tuned to
    async fn tuned(&self) -> DriverResult<f64>;

    /// Signal strength at the tuned frequency
    async fn strength(&self) -> DriverResult<f64>;

    /// Read a whole span `[start, stop]` in one call.
    ///
    /// Only called on devices whose capabilities set `spans`.
    async fn read_span(&self, start: f64, stop: f64) -> DriverResult<Vec<RawSample>> {
        let _ = (start, stop);
        Err(crate::error::DriverError::NotSupported(
            "span reads".to_string(),
        ))
    }

    /// Release the device
    async fn close(&self) -> DriverResult<()>;
}
