//! Scan configurations

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Capabilities;
use crate::channel::{frange_len, ChannelWindow, MAX_CHANNELS};
use crate::error::ConfigError;

/// A configuration document, as created by the external collaborator.
///
/// Holds one parameter set per device type; a worker only reads the section
/// for its own device type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Opaque identifier, as written to the config control file
    pub id: String,
    /// Parameter sets keyed by device-type tag
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
}

impl Configuration {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: BTreeMap::new(),
        }
    }

    /// Attach the parameter set for a device type
    pub fn with_device(mut self, device: impl Into<String>, scan: &ScanConfig) -> Self {
        let value = serde_json::to_value(scan).unwrap_or(Value::Null);
        self.values.insert(device.into(), value);
        self
    }

    /// Parse the scan parameters for one device type
    pub fn scan_config(&self, device: &str) -> Result<ScanConfig, ConfigError> {
        let section = self
            .values
            .get(device)
            .ok_or_else(|| ConfigError::MissingDevice {
                id: self.id.clone(),
                device: device.to_string(),
            })?;
        serde_json::from_value(section.clone()).map_err(|e| ConfigError::Invalid {
            id: self.id.clone(),
            message: e.to_string(),
        })
    }
}

/// Frequency range `[start, stop, step]` in Hz.
///
/// `step` doubles as the channel spacing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64, f64)", into = "(f64, f64, f64)")]
pub struct FreqRange {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl FreqRange {
    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        Self { start, stop, step }
    }

    /// A range whose stop lies below its start covers nothing
    pub fn is_empty(&self) -> bool {
        self.stop < self.start
    }
}

impl From<(f64, f64, f64)> for FreqRange {
    fn from((start, stop, step): (f64, f64, f64)) -> Self {
        Self { start, stop, step }
    }
}

impl From<FreqRange> for (f64, f64, f64) {
    fn from(r: FreqRange) -> Self {
        (r.start, r.stop, r.step)
    }
}

/// Scan parameters for one device type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Explicit frequencies, each read as its own channel
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub freqs: Vec<f64>,
    /// Swept range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<FreqRange>,
    /// Demodulation mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Device specific settings (antenna, attenuation, ...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub settings: Map<String, Value>,
}

impl ScanConfig {
    /// Range-only scan
    pub fn range(start: f64, stop: f64, step: f64) -> Self {
        Self {
            range: Some(FreqRange::new(start, stop, step)),
            ..Default::default()
        }
    }

    /// Scan of explicit frequencies
    pub fn freqs(freqs: Vec<f64>) -> Self {
        Self {
            freqs,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_setting(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(name.into(), value.into());
        self
    }

    /// Check the parameters against a device's capabilities
    pub fn validate(&self, caps: &Capabilities) -> Result<(), ConfigError> {
        if let Some(range) = &self.range {
            if !range.step.is_finite() || range.step <= 0.0 {
                return Err(ConfigError::BadScan(format!(
                    "range step must be positive, got {}",
                    range.step
                )));
            }
            if !range.start.is_finite() || !range.stop.is_finite() {
                return Err(ConfigError::BadScan("range bounds must be finite".to_string()));
            }
            let channels = ChannelWindow::padded(range).len().max(frange_len(range));
            if channels > MAX_CHANNELS {
                return Err(ConfigError::BadScan(format!(
                    "range {}..{} in steps of {} exceeds {} channels",
                    range.start, range.stop, range.step, MAX_CHANNELS
                )));
            }
        }
        if let Some(f) = self.freqs.iter().find(|f| !f.is_finite() || **f < 0.0) {
            return Err(ConfigError::BadScan(format!("invalid frequency {}", f)));
        }
        if let Some(mode) = &self.mode {
            caps.validate_mode(mode)?;
        }
        for (name, value) in &self.settings {
            caps.validate_setting(name, value)?;
        }
        Ok(())
    }
}
