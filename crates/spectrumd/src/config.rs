//! Daemon configuration
//!
//! ```toml
//! [worker]
//! device = "sensor"
//! run_dir = "/run/spectrum"
//! data_dir = "/var/lib/spectrum"
//!
//! [retry]
//! retries = 3
//! interval_ms = 100
//! set_check = 0
//!
//! [scan]
//! max_sweeps = 100
//!
//! [drivers.sensor]
//! address = "10.0.0.2"
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use spectrum_core::RetryPolicy;
use spectrum_drivers::DriversConfig;

/// Complete daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub worker: WorkerSection,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub scan: ScanSection,
    #[serde(default)]
    pub drivers: DriversConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSection {
    /// Worker name; names the control files. Defaults to the device type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Device-type tag of the driver to use
    #[serde(default = "default_device")]
    pub device: String,
    /// Directory holding the PID, config and status files
    #[serde(default = "default_run_dir")]
    pub run_dir: PathBuf,
    /// Directory holding `configs/` and `spectrum/`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,
}

fn default_device() -> String {
    "sensor".to_string()
}

fn default_run_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            name: None,
            device: default_device(),
            run_dir: default_run_dir(),
            data_dir: default_data_dir(),
            log_json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSection {
    /// Sweeps per episode; unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sweeps: Option<u64>,
}

impl DaemonConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn worker_name(&self) -> &str {
        self.worker.name.as_deref().unwrap_or(&self.worker.device)
    }

    pub fn configs_dir(&self) -> PathBuf {
        self.worker.data_dir.join("configs")
    }

    pub fn spectrum_dir(&self) -> PathBuf {
        self.worker.data_dir.join("spectrum")
    }
}
