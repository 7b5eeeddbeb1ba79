//! Configuration file handling for spectrumctl

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use spectrum_drivers::DriversConfig;
use std::path::{Path, PathBuf};

const DEFAULT_WORKER: &str = "sensor";

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Directory holding the workers' control files
    pub run_dir: Option<PathBuf>,
    /// Worker to address when `--worker` is not given
    pub worker: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// Driver settings, used to describe device capabilities
    #[serde(default)]
    pub drivers: DriversConfig,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// `<config dir>/spectrumctl/config.toml`
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("spectrumctl");
        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(
        &self,
        run_dir: Option<&Path>,
        worker: Option<&str>,
        no_color: bool,
    ) -> MergedConfig {
        MergedConfig {
            run_dir: run_dir
                .map(Path::to_path_buf)
                .or_else(|| self.run_dir.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
            worker: worker
                .map(String::from)
                .or_else(|| self.worker.clone())
                .unwrap_or_else(|| DEFAULT_WORKER.to_string()),
            no_color: no_color || self.no_color.unwrap_or(false),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone, PartialEq)]
pub struct MergedConfig {
    pub run_dir: PathBuf,
    pub worker: String,
    pub no_color: bool,
}
