//! Scan engine: turns a scan configuration into a stream of sweep updates
//!
//! The engine is pull based. Each call to [`ScanEngine::next`] performs one
//! complete sweep across the channel plan, appends the channel array to the
//! sink and yields a [`SweepUpdate`]. Cancellation is checked only before a
//! sweep starts, so a sweep in progress always completes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn, Instrument, Span};

use crate::channel::{find_peak, frange, ChannelPlan};
use crate::driver::{DeviceDriver, DeviceHandle, RawSample};
use crate::error::{ScanError, ScanResult};
use crate::models::{Configuration, ScanConfig, SweepUpdate};
use crate::retry::{RetryExecutor, Tuning};
use crate::sink::SpectrumSink;

/// Cooperative cancellation flag shared between the engine and its owner
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Episode-level knobs for an engine
#[derive(Clone)]
pub struct ScanOptions {
    pub executor: RetryExecutor,
    pub sink: Arc<dyn SpectrumSink>,
    /// Stop after this many sweeps
    pub max_sweeps: Option<u64>,
    pub cancel: CancelToken,
    /// Parent span for the engine's logs
    pub span: Span,
}

impl ScanOptions {
    pub fn new(executor: RetryExecutor, sink: Arc<dyn SpectrumSink>) -> Self {
        Self {
            executor,
            sink,
            max_sweeps: None,
            cancel: CancelToken::new(),
            span: Span::current(),
        }
    }

    pub fn with_max_sweeps(mut self, max_sweeps: Option<u64>) -> Self {
        self.max_sweeps = max_sweeps;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// One scan episode over an open device
pub struct ScanEngine {
    config_id: String,
    scan: ScanConfig,
    plan: ChannelPlan,
    spans: bool,
    handle: Option<Box<dyn DeviceHandle>>,
    options: ScanOptions,
    sweep_n: u64,
    sweeps_done: u64,
    mode_applied: bool,
    finished: bool,
}

impl ScanEngine {
    /// Validate a configuration against the driver and open the device.
    ///
    /// The sweep counter continues from what the sink already holds for this
    /// configuration. A configuration whose plan has no channels yields
    /// nothing and never opens the device.
    pub async fn open(
        driver: &dyn DeviceDriver,
        config: &Configuration,
        options: ScanOptions,
    ) -> ScanResult<Self> {
        let scan = config.scan_config(driver.device_type())?;
        let caps = driver.capabilities();
        scan.validate(&caps)?;

        let plan = ChannelPlan::from_scan(&scan);
        let sweep_n = options
            .sink
            .sweep_count(&config.id)
            .map_err(|e| ScanError::Sink(e.to_string()))?;

        let handle = if plan.is_empty() {
            debug!(parent: &options.span, config_id = %config.id, "Empty channel plan");
            None
        } else {
            let handle = driver
                .open(&scan.settings)
                .instrument(options.span.clone())
                .await?;
            Some(handle)
        };

        info!(
            parent: &options.span,
            config_id = %config.id,
            channels = plan.len(),
            sweep_n,
            "Scan episode opened"
        );

        Ok(Self {
            config_id: config.id.clone(),
            finished: handle.is_none(),
            scan,
            plan,
            spans: caps.spans,
            handle,
            options,
            sweep_n,
            sweeps_done: 0,
            mode_applied: false,
        })
    }

    pub fn config_id(&self) -> &str {
        &self.config_id
    }

    pub fn plan(&self) -> &ChannelPlan {
        &self.plan
    }

    /// Token that stops the engine before its next sweep
    pub fn cancel_token(&self) -> CancelToken {
        self.options.cancel.clone()
    }

    /// Run the next sweep.
    ///
    /// Returns `None` once the engine is exhausted, cancelled or closed. An
    /// error ends the episode: the device is closed and later calls return
    /// `None`.
    pub async fn next(&mut self) -> Option<ScanResult<SweepUpdate>> {
        if self.finished {
            return None;
        }
        let limit_reached = self
            .options
            .max_sweeps
            .is_some_and(|max| self.sweeps_done >= max);
        if self.options.cancel.is_cancelled() || limit_reached {
            self.close().await;
            return None;
        }

        let handle = self.handle.take()?;
        let span = self.options.span.clone();
        let result = self.sweep(handle.as_ref()).instrument(span).await;
        self.handle = Some(handle);

        match result {
            Ok(update) => Some(Ok(update)),
            Err(e) => {
                self.close().await;
                Some(Err(e))
            }
        }
    }

    /// Release the device; safe to call more than once
    pub async fn close(&mut self) {
        self.finished = true;
        if let Some(handle) = self.handle.take() {
            match handle.close().await {
                Ok(()) => debug!(parent: &self.options.span, "Device closed"),
                Err(e) => warn!(parent: &self.options.span, %e, "Device close failed"),
            }
        }
    }

    async fn sweep(&mut self, handle: &dyn DeviceHandle) -> ScanResult<SweepUpdate> {
        let exec = &self.options.executor;

        if !self.mode_applied {
            if let Some(mode) = &self.scan.mode {
                exec.run("set_mode", || handle.set_mode(mode)).await?;
                debug!(mode, "Mode applied");
            }
            self.mode_applied = true;
        }

        let mut tuned = Vec::with_capacity(self.plan.freqs.len());
        for &freq in &self.plan.freqs {
            tuned.push(read_tuned(exec, handle, freq).await?);
        }

        let mut samples: Vec<RawSample> = Vec::new();
        if let Some((range, window)) = &self.plan.range {
            if self.spans {
                samples = exec
                    .run("read_span", || handle.read_span(window.min, window.max))
                    .await?;
            } else {
                for freq in frange(range) {
                    if let Some(amplitude) = read_tuned(exec, handle, freq).await? {
                        samples.push(RawSample::new(freq, amplitude));
                    }
                }
            }
        }

        let channels = self.plan.channelize(&tuned, &samples);
        let timestamp = Utc::now().timestamp_millis();
        self.options
            .sink
            .write_spectrum(&self.config_id, timestamp, &channels)
            .map_err(|e| ScanError::Sink(e.to_string()))?;

        let update = SweepUpdate {
            timestamp,
            sweep_n: self.sweep_n,
            peaks: find_peak(&channels).into_iter().collect(),
            channels,
        };
        self.sweep_n += 1;
        self.sweeps_done += 1;
        debug!(sweep_n = update.sweep_n, peaks = ?update.peaks, "Sweep complete");
        Ok(update)
    }
}

/// Tune to one frequency and read its strength; `None` if unreachable
async fn read_tuned(
    exec: &RetryExecutor,
    handle: &dyn DeviceHandle,
    freq: f64,
) -> ScanResult<Option<f64>> {
    let tuning = exec
        .set_and_verify(freq, || handle.tune(freq), || handle.tuned())
        .await?;
    match tuning {
        Tuning::Applied => Ok(Some(exec.run("get_strength", || handle.strength()).await?)),
        Tuning::Unreachable => Ok(None),
    }
}
