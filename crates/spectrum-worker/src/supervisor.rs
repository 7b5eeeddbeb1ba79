//! ProcessSupervisor - lifecycle of one worker process
//!
//! ```text
//!            config id + wake            stop / exhausted / error
//!   Idle ───────────────────▶ Running ───────────────────────────▶ Stopping
//!    ▲                                                                │
//!    └──────────────────── park until next signal ◀───────────────────┘
//!                                    │ exit requested
//!                                    ▼
//!                               Terminated
//! ```
//!
//! The PID file is claimed in [`ProcessSupervisor::init`] and, together with
//! the status file, released by a drop guard on every exit path.

use std::sync::Arc;

use spectrum_control::{ControlFiles, ProcessError};
use spectrum_core::{
    DeviceDriver, RetryExecutor, RetryPolicy, ScanEngine, ScanOptions, ScanResult, SpectrumSink,
    Status,
};
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::error::WorkerError;
use crate::signals::{self, ControlFlags, StopHandle};
use crate::store::ConfigSource;

/// Releases the worker's PID and status files when dropped
struct PidGuard {
    files: ControlFiles,
    pid: u32,
}

impl Drop for PidGuard {
    fn drop(&mut self) {
        match self.files.remove_pid_if(self.pid) {
            Ok(true) => {
                if let Err(e) = self.files.remove_status() {
                    warn!(%e, "Failed to remove status file");
                }
            }
            Ok(false) => warn!(pid = self.pid, "PID file taken over, leaving it in place"),
            Err(e) => warn!(%e, "Failed to remove PID file"),
        }
        info!(worker = self.files.name(), "Worker released");
    }
}

/// Runs scan episodes for one device on behalf of external controllers
pub struct ProcessSupervisor {
    files: ControlFiles,
    driver: Arc<dyn DeviceDriver>,
    configs: Arc<dyn ConfigSource>,
    sink: Arc<dyn SpectrumSink>,
    retry: RetryPolicy,
    max_sweeps: Option<u64>,
    flags: ControlFlags,
    span: Span,
    guard: Option<PidGuard>,
}

impl ProcessSupervisor {
    pub fn new(
        files: ControlFiles,
        driver: Arc<dyn DeviceDriver>,
        configs: Arc<dyn ConfigSource>,
        sink: Arc<dyn SpectrumSink>,
    ) -> Self {
        let span = info_span!("worker", name = %files.name(), device = %driver.device_type());
        Self {
            files,
            driver,
            configs,
            sink,
            retry: RetryPolicy::default(),
            max_sweeps: None,
            flags: ControlFlags::new(),
            span,
            guard: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Bound each episode to a number of sweeps
    pub fn with_max_sweeps(mut self, max_sweeps: Option<u64>) -> Self {
        self.max_sweeps = max_sweeps;
        self
    }

    /// Log under a caller-supplied span instead of the default `worker` span
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn files(&self) -> &ControlFiles {
        &self.files
    }

    pub fn flags(&self) -> &ControlFlags {
        &self.flags
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.flags.clone())
    }

    /// Stop the current episode; idempotent
    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    /// Start listening for control signals and claim the PID file.
    ///
    /// Handlers go in first so a controller that sees the PID file can
    /// signal at once. Fails with [`ProcessError::AlreadyRunning`] without
    /// touching the PID file if a live process owns it. A stale PID file is
    /// replaced.
    pub fn init(&mut self) -> Result<(), WorkerError> {
        signals::install(&self.flags).map_err(WorkerError::Signals)?;
        self.claim_pid()
    }

    fn claim_pid(&mut self) -> Result<(), WorkerError> {
        let _enter = self.span.enter();
        match self.files.read_pid() {
            Ok(Some(pid)) => {
                error!(pid, "Process already exists");
                return Err(ProcessError::AlreadyRunning(pid).into());
            }
            Ok(None) => {}
            Err(e) if e.is_stale() => {
                warn!(%e, "Replacing stale PID file");
                let removed = match e {
                    ProcessError::NotRunning(dead) => self.files.remove_pid_if(dead).map(|_| ()),
                    _ => self.files.remove_pid(),
                };
                removed.map_err(|source| ProcessError::PidFile {
                    path: self.files.pid_path().to_path_buf(),
                    source,
                })?;
            }
            Err(e) => return Err(e.into()),
        }

        let pid = std::process::id();
        if let Err(e) = self.files.create_pid(pid) {
            error!(%e, "Lost the PID file race");
            return Err(e.into());
        }
        self.guard = Some(PidGuard {
            files: self.files.clone(),
            pid,
        });
        info!(pid, path = %self.files.pid_path().display(), "PID file claimed");
        Ok(())
    }

    /// Serve configurations until an exit is requested.
    ///
    /// Returns after releasing the PID and status files.
    pub async fn start(&mut self) -> Result<(), WorkerError> {
        let guard = self.guard.take().ok_or(WorkerError::NotInitialised)?;
        let span = self.span.clone();
        let result = self.serve().instrument(span).await;
        drop(guard);
        result
    }

    async fn serve(&mut self) -> Result<(), WorkerError> {
        info!("Worker started");
        loop {
            let config_id = self.files.read_config()?;
            if let Some(id) = &config_id {
                self.flags.clear_stop();
                self.clear_status();
                match self.run_episode(id).await {
                    Ok(()) => self.clear_status(),
                    Err(e) => {
                        error!(config_id = %id, %e, "Episode failed");
                        let status = Status {
                            error: Some(e.to_string()),
                            ..Status::for_config(id.as_str())
                        };
                        self.publish(&status);
                    }
                }
            }

            if self.flags.tidy_on_exit() {
                if let Some(id) = &config_id {
                    match self.files.remove_config_if(id) {
                        Ok(true) => debug!(config_id = %id, "Config file removed"),
                        Ok(false) => {}
                        Err(e) => warn!(%e, "Failed to remove config file"),
                    }
                }
            }

            if self.flags.exit_requested() {
                info!(tidy = self.flags.tidy_on_exit(), "Exit requested");
                return Ok(());
            }

            let pending = self.files.read_config()?;
            if pending.is_some() && pending != config_id {
                debug!(config_id = ?pending, "New configuration pending");
                continue;
            }

            debug!("Idle");
            self.flags.wait().await;
        }
    }

    async fn run_episode(&mut self, config_id: &str) -> ScanResult<()> {
        let span = info_span!("episode", config_id);
        info!(parent: &span, "Episode starting");

        let config = self.configs.load(config_id)?;
        let options = ScanOptions::new(RetryExecutor::new(self.retry), self.sink.clone())
            .with_max_sweeps(self.max_sweeps)
            .with_span(span.clone());
        let mut engine = ScanEngine::open(self.driver.as_ref(), &config, options).await?;

        let mut status = Status::for_config(config_id);
        let outcome = loop {
            match engine.next().await {
                Some(Ok(update)) => {
                    status.record_sweep(&update);
                    self.publish(&status);
                    if self.flags.stop_requested() {
                        info!(parent: &span, sweep_n = update.sweep_n, "Stop requested");
                        break Ok(());
                    }
                    // let the signal listeners run between sweeps
                    tokio::task::yield_now().await;
                }
                Some(Err(e)) => break Err(e),
                None => {
                    info!(parent: &span, "Scan exhausted");
                    break Ok(());
                }
            }
        };
        engine.close().await;
        outcome
    }

    fn publish(&self, status: &Status) {
        if let Err(e) = self.files.write_status(status) {
            warn!(%e, "Failed to write status file");
        }
    }

    fn clear_status(&self) {
        if let Err(e) = self.files.remove_status() {
            warn!(%e, "Failed to remove status file");
        }
    }
}
