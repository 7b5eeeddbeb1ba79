//! Channelization of raw sweep samples
//!
//! A sweep's raw samples are folded into fixed-width channels: each channel
//! takes the maximum amplitude of the samples inside its half-open window
//! `[min + i*spacing, min + (i+1)*spacing)`, truncated toward zero and
//! clamped to the signed 8-bit range. Explicit frequencies come first in the
//! channel array, one channel each, followed by the range channels.

use crate::driver::RawSample;
use crate::models::{FreqRange, Peak, ScanConfig};

/// Value of a channel that received no samples
pub const EMPTY_CHANNEL: i8 = i8::MIN;

/// Quotients this close to an integer are treated as exact
const EPSILON: f64 = 1e-9;

/// Number of channels of width `spacing` covering `[min, max)`
pub fn channel_count(min: f64, max: f64, spacing: f64) -> usize {
    if spacing.is_nan() || spacing <= 0.0 || max <= min {
        return 0;
    }
    let x = (max - min) / spacing;
    let r = x.round();
    if (x - r).abs() < EPSILON * x.max(1.0) {
        r as usize
    } else {
        x.ceil() as usize
    }
}

/// Upper bound on the channels or tuned steps a single range may expand to
pub const MAX_CHANNELS: usize = 1_000_000;

/// Frequencies to step through when a tuned device sweeps a range.
///
/// Runs from `start` to `stop` inclusive in `round((stop - start) / step)`
/// steps, each rounded to the decimal precision of `step`. Frequencies are
/// produced lazily.
pub fn frange(range: &FreqRange) -> impl Iterator<Item = f64> {
    let FreqRange { start, step, .. } = *range;
    let digits = -(step.log10().round() as i32);
    frange_steps(range).into_iter().flat_map(move |n| {
        (0..=n).map(move |i| round_to(start + i as f64 * step, digits))
    })
}

/// Index of the last `frange` frequency, `None` when the range is empty
fn frange_steps(range: &FreqRange) -> Option<u64> {
    if range.is_empty() || range.step.is_nan() || range.step <= 0.0 {
        return None;
    }
    Some(((range.stop - range.start) / range.step).round() as u64)
}

/// Number of frequencies `frange` yields for a range
pub fn frange_len(range: &FreqRange) -> usize {
    frange_steps(range).map_or(0, |n| {
        usize::try_from(n)
            .unwrap_or(usize::MAX)
            .saturating_add(1)
    })
}

fn round_to(x: f64, digits: i32) -> f64 {
    if digits >= 0 {
        let f = 10f64.powi(digits);
        (x * f).round() / f
    } else {
        let f = 10f64.powi(-digits);
        (x / f).round() * f
    }
}

/// Truncate an amplitude toward zero and clamp it to `i8`
pub fn clamp_amplitude(amplitude: f64) -> i8 {
    (amplitude.trunc() as i64).clamp(i8::MIN as i64, i8::MAX as i64) as i8
}

/// Uniform channel window over a swept range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelWindow {
    /// Lower edge of channel 0
    pub min: f64,
    /// Upper edge (exclusive)
    pub max: f64,
    /// Channel width
    pub spacing: f64,
}

impl ChannelWindow {
    pub fn new(min: f64, max: f64, spacing: f64) -> Self {
        Self { min, max, spacing }
    }

    /// Window for a range, padded half a channel either side so that every
    /// range frequency sits in the middle of its channel
    pub fn padded(range: &FreqRange) -> Self {
        let half = range.step * 0.5;
        Self::new(range.start - half, range.stop + half, range.step)
    }

    pub fn len(&self) -> usize {
        channel_count(self.min, self.max, self.spacing)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Channel a frequency falls into, if any
    pub fn index_of(&self, freq: f64) -> Option<usize> {
        if freq < self.min || freq >= self.max {
            return None;
        }
        let x = (freq - self.min) / self.spacing;
        let r = x.round();
        let idx = if (x - r).abs() < EPSILON * x.max(1.0) {
            r as usize
        } else {
            x.floor() as usize
        };
        (idx < self.len()).then_some(idx)
    }

    /// Running maximum per channel
    pub fn fold(&self, samples: &[RawSample]) -> Vec<i8> {
        let mut maxima: Vec<Option<f64>> = vec![None; self.len()];
        for sample in samples.iter().filter(|s| !s.amplitude.is_nan()) {
            if let Some(idx) = self.index_of(sample.freq) {
                let slot = &mut maxima[idx];
                *slot = Some(slot.map_or(sample.amplitude, |m| m.max(sample.amplitude)));
            }
        }
        maxima
            .into_iter()
            .map(|m| m.map_or(EMPTY_CHANNEL, clamp_amplitude))
            .collect()
    }
}

/// Channel layout of a scan configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelPlan {
    /// Explicit frequencies, one channel each
    pub freqs: Vec<f64>,
    /// Swept range and its channel window
    pub range: Option<(FreqRange, ChannelWindow)>,
}

impl ChannelPlan {
    pub fn from_scan(scan: &ScanConfig) -> Self {
        let range = scan
            .range
            .filter(|r| !r.is_empty())
            .map(|r| (r, ChannelWindow::padded(&r)))
            .filter(|(_, w)| !w.is_empty());
        Self {
            freqs: scan.freqs.clone(),
            range,
        }
    }

    /// Total channels per sweep
    pub fn len(&self) -> usize {
        self.freqs.len() + self.range.map_or(0, |(_, w)| w.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fold one sweep's readings into the channel array.
    ///
    /// `tuned` holds one reading per explicit frequency (`None` when the
    /// frequency was unreachable); `span` holds the range samples.
    pub fn channelize(&self, tuned: &[Option<f64>], span: &[RawSample]) -> Vec<i8> {
        let mut channels: Vec<i8> = self
            .freqs
            .iter()
            .enumerate()
            .map(|(i, _)| {
                tuned
                    .get(i)
                    .copied()
                    .flatten()
                    .map_or(EMPTY_CHANNEL, clamp_amplitude)
            })
            .collect();
        if let Some((_, window)) = &self.range {
            channels.extend(window.fold(span));
        }
        channels
    }
}

/// First channel holding the maximum value
pub fn find_peak(channels: &[i8]) -> Option<Peak> {
    let mut peak: Option<Peak> = None;
    for (freq_n, &strength) in channels.iter().enumerate() {
        if peak.map_or(true, |p| strength > p.strength) {
            peak = Some(Peak { freq_n, strength });
        }
    }
    peak
}
