//! Simulated RF environment shared by the drivers

use rand::Rng;

use crate::config::SimSignal;

/// Carriers over a flat noise floor
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub noise_floor: f64,
    /// Peak-to-peak random variation per reading, in dB
    pub noise_db: f64,
    pub signals: Vec<SimSignal>,
}

impl Scene {
    pub fn new(noise_floor: f64, noise_db: f64, signals: Vec<SimSignal>) -> Self {
        Self {
            noise_floor,
            noise_db,
            signals,
        }
    }

    /// Level at `freq` in dBm.
    ///
    /// Each carrier falls off by 20 dB per `width` Hz from its centre; the
    /// strongest contribution wins.
    pub fn level(&self, freq: f64) -> f64 {
        let carrier = self
            .signals
            .iter()
            .filter(|s| s.width > 0.0)
            .map(|s| s.level - 20.0 * (freq - s.freq).abs() / s.width)
            .fold(f64::NEG_INFINITY, f64::max);
        let level = carrier.max(self.noise_floor);
        if self.noise_db > 0.0 {
            let half = self.noise_db / 2.0;
            level + rand::thread_rng().gen_range(-half..=half)
        } else {
            level
        }
    }
}
