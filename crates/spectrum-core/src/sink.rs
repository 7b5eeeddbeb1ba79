//! Destination for per-sweep channel data

use std::io;

/// Append-only store for channel arrays, keyed by configuration and time
pub trait SpectrumSink: Send + Sync {
    /// Sweeps already stored for a configuration; new sweeps continue the
    /// numbering from here
    fn sweep_count(&self, config_id: &str) -> io::Result<u64>;

    /// Append one sweep
    fn write_spectrum(&self, config_id: &str, timestamp: i64, channels: &[i8]) -> io::Result<()>;
}

/// Sink that drops everything, for workers that only report status
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl SpectrumSink for NullSink {
    fn sweep_count(&self, _config_id: &str) -> io::Result<u64> {
        Ok(0)
    }

    fn write_spectrum(
        &self,
        _config_id: &str,
        _timestamp: i64,
        _channels: &[i8],
    ) -> io::Result<()> {
        Ok(())
    }
}
