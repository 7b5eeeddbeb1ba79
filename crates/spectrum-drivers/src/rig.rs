//! Tuned receiver driver
//!
//! The rig reads one frequency at a time: tune, optionally read the tuned
//! frequency back, then read the signal strength. Frequencies outside the
//! rig's tuning range are silently ignored by the hardware, which is what
//! set-check detects.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use spectrum_core::{
    Capabilities, Choice, DeviceDriver, DeviceError, DeviceHandle, DeviceSettings, DriverError,
    DriverResult,
};
use tracing::{debug, info};

use crate::config::RigConfig;
use crate::sim::Scene;
use crate::transport::SimLink;

/// Device-type tag of the tuned receiver
pub const RIG_DEVICE: &str = "rig";

const MODES: [&str; 6] = ["AM", "FM", "WFM", "USB", "LSB", "CW"];

pub struct RigDriver {
    config: RigConfig,
    link: Arc<SimLink>,
}

impl RigDriver {
    pub fn new(config: RigConfig) -> Self {
        let link = Arc::new(SimLink::new(config.latency_ms));
        link.set_connected(!config.offline);
        Self { config, link }
    }

    /// Link shared by every handle this driver opens
    pub fn link(&self) -> &Arc<SimLink> {
        &self.link
    }
}

#[async_trait]
impl DeviceDriver for RigDriver {
    fn device_type(&self) -> &str {
        RIG_DEVICE
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default().with_modes(MODES.iter().map(|m| Choice::new(*m, *m)).collect())
    }

    async fn open(&self, _settings: &DeviceSettings) -> Result<Box<dyn DeviceHandle>, DeviceError> {
        self.link.connect().map_err(|e| {
            DeviceError::Open(format!(
                "rig model {} on {}: {}",
                self.config.model,
                self.config.pathname.as_deref().unwrap_or("default port"),
                e
            ))
        })?;
        info!(model = self.config.model, "Rig opened");

        Ok(Box::new(RigHandle {
            link: self.link.clone(),
            scene: Scene::new(
                self.config.noise_floor,
                self.config.noise_db,
                self.config.signals.clone(),
            ),
            min_freq: self.config.min_freq,
            max_freq: self.config.max_freq,
            freq: Mutex::new(self.config.min_freq),
            open: AtomicBool::new(true),
        }))
    }
}

struct RigHandle {
    link: Arc<SimLink>,
    scene: Scene,
    min_freq: f64,
    max_freq: f64,
    freq: Mutex<f64>,
    open: AtomicBool,
}

impl RigHandle {
    async fn call(&self, name: &str) -> DriverResult<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(DriverError::NotConnected);
        }
        self.link.exchange(name).await
    }
}

#[async_trait]
impl DeviceHandle for RigHandle {
    async fn set_mode(&self, mode: &str) -> DriverResult<()> {
        self.call("set_mode").await?;
        if !MODES.contains(&mode) {
            return Err(DriverError::Rejected(format!("mode {}", mode)));
        }
        debug!(mode, "Rig mode set");
        Ok(())
    }

    async fn tune(&self, freq: f64) -> DriverResult<()> {
        self.call("set_freq").await?;
        if (self.min_freq..=self.max_freq).contains(&freq) {
            *self.freq.lock() = freq;
        } else {
            debug!(freq, "Frequency outside tuning range");
        }
        Ok(())
    }

    async fn tuned(&self) -> DriverResult<f64> {
        self.call("get_freq").await?;
        Ok(*self.freq.lock())
    }

    async fn strength(&self) -> DriverResult<f64> {
        self.call("get_strength").await?;
        Ok(self.scene.level(*self.freq.lock()))
    }

    async fn close(&self) -> DriverResult<()> {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!("Rig closed");
        }
        Ok(())
    }
}
