//! Device capability descriptors

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// One legal value of a configurable parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Value as written in a configuration
    pub value: Value,
    /// Human-readable label
    pub label: String,
}

impl Choice {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// Numeric values compare by value so that `10` matches `10.0`
    fn matches(&self, candidate: &Value) -> bool {
        match (self.value.as_f64(), candidate.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => &self.value == candidate,
        }
    }
}

/// What a device type can be configured with.
///
/// Static per device type; defined when the driver is registered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Named parameter domains (antenna, attenuation, ...)
    #[serde(default)]
    pub parameters: BTreeMap<String, Vec<Choice>>,
    /// Demodulation modes the device can be put into
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modes: Vec<Choice>,
    /// Device reads a whole frequency span in one call
    #[serde(default)]
    pub spans: bool,
}

impl Capabilities {
    /// Add a parameter domain
    pub fn with_parameter(mut self, name: impl Into<String>, choices: Vec<Choice>) -> Self {
        self.parameters.insert(name.into(), choices);
        self
    }

    /// Add the supported modes
    pub fn with_modes(mut self, modes: Vec<Choice>) -> Self {
        self.modes = modes;
        self
    }

    /// Mark the device as span-reading
    pub fn with_spans(mut self) -> Self {
        self.spans = true;
        self
    }

    /// Check a single setting against its domain
    pub fn validate_setting(&self, name: &str, value: &Value) -> Result<(), ConfigError> {
        let choices = self
            .parameters
            .get(name)
            .ok_or_else(|| ConfigError::UnknownSetting(name.to_string()))?;
        if choices.iter().any(|c| c.matches(value)) {
            Ok(())
        } else {
            Err(ConfigError::OutOfDomain {
                setting: name.to_string(),
                value: value.to_string(),
            })
        }
    }

    /// Check a mode name against the mode list (matched by label or value)
    pub fn validate_mode(&self, mode: &str) -> Result<(), ConfigError> {
        let known = self
            .modes
            .iter()
            .any(|c| c.label == mode || c.value.as_str() == Some(mode));
        if known {
            Ok(())
        } else {
            Err(ConfigError::UnsupportedMode(mode.to_string()))
        }
    }
}
