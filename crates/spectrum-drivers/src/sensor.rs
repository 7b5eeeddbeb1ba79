//! Sweeping sensor driver
//!
//! The sensor returns a whole span of evenly spaced bins per call, so the
//! scan engine reads each range with a single `read_span`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use spectrum_core::{
    Capabilities, Choice, DeviceDriver, DeviceError, DeviceHandle, DeviceSettings, DriverError,
    DriverResult, RawSample,
};
use tracing::{debug, info};

use crate::config::SensorConfig;
use crate::sim::Scene;
use crate::transport::SimLink;

/// Device-type tag of the sweeping sensor
pub const SENSOR_DEVICE: &str = "sensor";

/// Antenna input that is internally terminated
const ANTENNA_TERMINATED: f64 = 3.0;

/// Gain of the preamplifier when switched on, in dB
const PREAMP_GAIN_DB: f64 = 10.0;

/// Upper bound on bins per span read
const MAX_BINS: f64 = 1_000_000.0;

pub struct SensorDriver {
    config: SensorConfig,
    link: Arc<SimLink>,
}

impl SensorDriver {
    pub fn new(config: SensorConfig) -> Self {
        let link = Arc::new(SimLink::new(config.latency_ms));
        link.set_connected(!config.offline);
        Self { config, link }
    }

    pub fn link(&self) -> &Arc<SimLink> {
        &self.link
    }
}

#[async_trait]
impl DeviceDriver for SensorDriver {
    fn device_type(&self) -> &str {
        SENSOR_DEVICE
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
            .with_parameter(
                "antenna",
                vec![
                    Choice::new(0, "Antenna 1"),
                    Choice::new(1, "Antenna 2"),
                    Choice::new(2, "Test Signal"),
                    Choice::new(3, "Terminated"),
                ],
            )
            .with_parameter("preamp", vec![Choice::new(0, "Off"), Choice::new(1, "On")])
            .with_parameter(
                "attenuation",
                vec![
                    Choice::new(0.0, "Off"),
                    Choice::new(10.0, "10dB"),
                    Choice::new(20.0, "20dB"),
                ],
            )
            .with_parameter(
                "window",
                vec![
                    Choice::new(0, "Hann"),
                    Choice::new(1, "Gauss Top"),
                    Choice::new(2, "Flat Top"),
                    Choice::new(3, "Uniform"),
                    Choice::new(4, "Unknown"),
                ],
            )
            .with_spans()
    }

    async fn open(&self, settings: &DeviceSettings) -> Result<Box<dyn DeviceHandle>, DeviceError> {
        self.link.connect().map_err(|e| {
            DeviceError::Open(format!(
                "sensor at {}:{}: {}",
                self.config.address, self.config.port, e
            ))
        })?;

        let setting = |name: &str| settings.get(name).and_then(Value::as_f64).unwrap_or(0.0);
        let terminated = setting("antenna") == ANTENNA_TERMINATED;
        let gain = setting("preamp") * PREAMP_GAIN_DB - setting("attenuation");
        let signals = if terminated {
            Vec::new()
        } else {
            self.config.signals.clone()
        };
        info!(
            address = %self.config.address,
            port = self.config.port,
            terminated,
            gain,
            "Sensor connected"
        );

        Ok(Box::new(SensorHandle {
            link: self.link.clone(),
            scene: Scene::new(self.config.noise_floor, self.config.noise_db, signals),
            gain,
            bin_spacing: self.config.bin_spacing,
            open: AtomicBool::new(true),
        }))
    }
}

struct SensorHandle {
    link: Arc<SimLink>,
    scene: Scene,
    gain: f64,
    bin_spacing: f64,
    open: AtomicBool,
}

impl SensorHandle {
    async fn call(&self, name: &str) -> DriverResult<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(DriverError::NotConnected);
        }
        self.link.exchange(name).await
    }

    fn unsupported(call: &str) -> DriverError {
        DriverError::NotSupported(format!("{} on a sweeping sensor", call))
    }
}

#[async_trait]
impl DeviceHandle for SensorHandle {
    async fn set_mode(&self, _mode: &str) -> DriverResult<()> {
        Err(Self::unsupported("set_mode"))
    }

    async fn tune(&self, _freq: f64) -> DriverResult<()> {
        Err(Self::unsupported("tune"))
    }

    async fn tuned(&self) -> DriverResult<f64> {
        Err(Self::unsupported("tuned"))
    }

    async fn strength(&self) -> DriverResult<f64> {
        Err(Self::unsupported("strength"))
    }

    async fn read_span(&self, start: f64, stop: f64) -> DriverResult<Vec<RawSample>> {
        self.call("sweep").await?;
        if stop < start {
            return Ok(Vec::new());
        }
        let bins = ((stop - start) / self.bin_spacing).floor();
        if !bins.is_finite() || bins > MAX_BINS {
            return Err(DriverError::Rejected(format!(
                "span {}..{} too wide for {} Hz bins",
                start, stop, self.bin_spacing
            )));
        }
        let samples: Vec<RawSample> = (0..=bins as u64)
            .map(|i| {
                let freq = start + i as f64 * self.bin_spacing;
                RawSample::new(freq, self.scene.level(freq) + self.gain)
            })
            .collect();
        debug!(start, stop, bins = samples.len(), "Span read");
        Ok(samples)
    }

    async fn close(&self) -> DriverResult<()> {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!("Sensor disconnected");
        }
        Ok(())
    }
}
