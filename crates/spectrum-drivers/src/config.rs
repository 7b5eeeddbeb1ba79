//! Driver configuration
//!
//! Loaded from the `[drivers]` table of the daemon configuration.

use serde::{Deserialize, Serialize};

/// Settings for every driver the worker may use
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriversConfig {
    #[serde(default)]
    pub rig: RigConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
}

/// A carrier present in the simulated band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimSignal {
    /// Centre frequency in Hz
    pub freq: f64,
    /// Level at the centre in dBm
    pub level: f64,
    /// Distance in Hz over which the level falls by 20 dB
    #[serde(default = "default_width")]
    pub width: f64,
}

fn default_width() -> f64 {
    100e3
}

// =============================================================================
// Tuned receiver
// =============================================================================

/// Tuned receiver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigConfig {
    /// Rig model number (1 = dummy)
    #[serde(default = "default_model")]
    pub model: u32,
    /// Serial device path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pathname: Option<String>,
    /// Simulated latency per call in milliseconds
    #[serde(default)]
    pub latency_ms: u64,
    /// Lowest frequency the rig can tune
    #[serde(default = "default_rig_min")]
    pub min_freq: f64,
    /// Highest frequency the rig can tune
    #[serde(default = "default_rig_max")]
    pub max_freq: f64,
    /// Noise floor in dBm
    #[serde(default = "default_noise_floor")]
    pub noise_floor: f64,
    /// Random variation added to each reading, in dB
    #[serde(default)]
    pub noise_db: f64,
    #[serde(default)]
    pub signals: Vec<SimSignal>,
    /// Simulate a disconnected rig
    #[serde(default)]
    pub offline: bool,
}

fn default_model() -> u32 {
    1
}

fn default_rig_min() -> f64 {
    100e3
}

fn default_rig_max() -> f64 {
    1.3e9
}

fn default_noise_floor() -> f64 {
    -120.0
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            pathname: None,
            latency_ms: 0,
            min_freq: default_rig_min(),
            max_freq: default_rig_max(),
            noise_floor: default_noise_floor(),
            noise_db: 0.0,
            signals: Vec::new(),
            offline: false,
        }
    }
}

// =============================================================================
// Sweeping sensor
// =============================================================================

/// Sweeping sensor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Sensor host
    #[serde(default = "default_address")]
    pub address: String,
    /// Sensor port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Simulated latency per span read in milliseconds
    #[serde(default)]
    pub latency_ms: u64,
    /// Spacing of the bins returned by a span read, in Hz
    #[serde(default = "default_bin_spacing")]
    pub bin_spacing: f64,
    /// Noise floor in dBm
    #[serde(default = "default_noise_floor")]
    pub noise_floor: f64,
    /// Random variation added to each bin, in dB
    #[serde(default)]
    pub noise_db: f64,
    #[serde(default)]
    pub signals: Vec<SimSignal>,
    /// Simulate an unreachable sensor
    #[serde(default)]
    pub offline: bool,
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5025
}

fn default_bin_spacing() -> f64 {
    25e3
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            latency_ms: 0,
            bin_spacing: default_bin_spacing(),
            noise_floor: default_noise_floor(),
            noise_db: 0.0,
            signals: Vec::new(),
            offline: false,
        }
    }
}
