//! Worker status snapshots

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Strongest channel of a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peak {
    /// Channel index within the sweep
    pub freq_n: usize,
    /// Clamped channel value
    pub strength: i8,
}

/// One step yielded by the scan engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepUpdate {
    /// Wall clock time of the sweep (ms since the epoch)
    pub timestamp: i64,
    /// Cumulative sweep counter, continued across restarts
    pub sweep_n: u64,
    /// Peak detections
    pub peaks: Vec<Peak>,
    /// Per-channel values; persisted to the data sink, not to the status file
    #[serde(skip)]
    pub channels: Vec<i8>,
}

/// Snapshot written to the status file.
///
/// Progress fields are free-form; the supervisor adds `config_id` and
/// `error`, readers add `timestamp` from the file's modification time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Configuration in effect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_id: Option<String>,
    /// Why the last episode ended abnormally, or why the worker is unreachable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Status file modification time (ms), injected by readers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Free-form progress fields
    #[serde(flatten)]
    pub progress: Map<String, Value>,
}

impl Status {
    /// Status for a fresh episode
    pub fn for_config(config_id: impl Into<String>) -> Self {
        Self {
            config_id: Some(config_id.into()),
            ..Default::default()
        }
    }

    /// Record the latest sweep under the `sweep` progress key
    pub fn record_sweep(&mut self, update: &SweepUpdate) {
        let value = serde_json::to_value(update).unwrap_or(Value::Null);
        self.progress.insert("sweep".to_string(), value);
    }

    /// Latest sweep, if one was recorded
    pub fn sweep(&self) -> Option<SweepUpdate> {
        self.progress
            .get("sweep")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn is_empty(&self) -> bool {
        self.config_id.is_none()
            && self.error.is_none()
            && self.timestamp.is_none()
            && self.progress.is_empty()
    }
}
