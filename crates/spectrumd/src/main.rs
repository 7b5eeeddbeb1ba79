//! spectrumd - spectrum worker daemon
//!
//! Drives one measurement device. Controllers pick the configuration by
//! writing `<run_dir>/<name>.config` and sending SIGUSR1; progress is
//! published to `<run_dir>/<name>.status`.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use spectrum_control::ControlFiles;
use spectrum_drivers::DriverRegistry;
use spectrum_worker::{FsConfigStore, FsSpectrumStore, ProcessSupervisor};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::DaemonConfig;

const DEFAULT_FILTER: &str =
    "spectrumd=info,spectrum_worker=info,spectrum_core=info,spectrum_drivers=info";

#[derive(Parser, Debug)]
#[command(name = "spectrumd")]
#[command(about = "Spectrum worker daemon", version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "SPECTRUMD_CONFIG")]
    config: Option<PathBuf>,

    /// Device type to drive (rig, sensor)
    #[arg(short, long)]
    device: Option<String>,

    /// Worker name; defaults to the device type
    #[arg(short, long)]
    name: Option<String>,

    /// Directory for the PID, config and status files
    #[arg(long)]
    run_dir: Option<PathBuf>,

    /// Directory holding configs/ and spectrum/
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Retries per device call
    #[arg(long)]
    retries: Option<u32>,

    /// Base retry backoff in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Set/read-back rounds per tuned frequency
    #[arg(long)]
    set_check: Option<u32>,

    /// Sweeps per episode
    #[arg(long)]
    max_sweeps: Option<u64>,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Apply command-line overrides on top of the file configuration
    fn into_config(self) -> anyhow::Result<DaemonConfig> {
        let mut config = match &self.config {
            Some(path) => DaemonConfig::load(path)?,
            None => DaemonConfig::default(),
        };

        if let Some(device) = self.device {
            config.worker.device = device;
        }
        if self.name.is_some() {
            config.worker.name = self.name;
        }
        if let Some(run_dir) = self.run_dir {
            config.worker.run_dir = run_dir;
        }
        if let Some(data_dir) = self.data_dir {
            config.worker.data_dir = data_dir;
        }
        if let Some(retries) = self.retries {
            config.retry.retries = retries;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.retry.interval_ms = interval_ms;
        }
        if let Some(set_check) = self.set_check {
            config.retry.set_check = set_check;
        }
        if self.max_sweeps.is_some() {
            config.scan.max_sweeps = self.max_sweeps;
        }
        config.worker.log_json |= self.log_json;
        Ok(config)
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            DEFAULT_FILTER.replace("=info", "=debug").into()
        } else {
            DEFAULT_FILTER.into()
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let verbose = args.verbose;
    let config = args.into_config()?;
    init_tracing(verbose, config.worker.log_json);

    let registry = DriverRegistry::from_config(&config.drivers);
    let driver = registry
        .get(&config.worker.device)
        .with_context(|| format!("known devices: {}", registry.device_types().join(", ")))?;

    std::fs::create_dir_all(&config.worker.run_dir).with_context(|| {
        format!(
            "Failed to create run directory {}",
            config.worker.run_dir.display()
        )
    })?;

    let files = ControlFiles::new(&config.worker.run_dir, config.worker_name());
    let configs = Arc::new(FsConfigStore::new(config.configs_dir()));
    let sink = Arc::new(FsSpectrumStore::new(config.spectrum_dir()));

    info!(
        worker = config.worker_name(),
        device = %config.worker.device,
        run_dir = %config.worker.run_dir.display(),
        data_dir = %config.worker.data_dir.display(),
        "Starting spectrumd"
    );

    // Signal listeners and the device share one thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;

    runtime.block_on(async move {
        let mut supervisor = ProcessSupervisor::new(files, driver, configs, sink)
            .with_retry(config.retry)
            .with_max_sweeps(config.scan.max_sweeps);
        supervisor.init().context("Failed to initialise worker")?;
        supervisor.start().await.context("Worker failed")?;
        info!("spectrumd stopped");
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "spectrumd",
            "--device",
            "rig",
            "--run-dir",
            "/tmp/run",
            "--retries",
            "5",
            "--set-check",
            "2",
            "--max-sweeps",
            "7",
        ]);
        let config = args.into_config().unwrap();
        assert_eq!(config.worker_name(), "rig");
        assert_eq!(config.worker.run_dir, PathBuf::from("/tmp/run"));
        assert_eq!(config.retry.retries, 5);
        assert_eq!(config.retry.set_check, 2);
        assert_eq!(config.scan.max_sweeps, Some(7));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let args = Args::parse_from(["spectrumd", "--config", "/nonexistent/spectrumd.toml"]);
        let err = args.into_config().unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
