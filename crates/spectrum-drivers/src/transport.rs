//! Simulated link to a device

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use spectrum_core::{DriverError, DriverResult};
use tracing::trace;

/// Link state, latency and fault injection for a simulated device
#[derive(Debug)]
pub struct SimLink {
    latency_ms: u64,
    connected: AtomicBool,
    /// Calls that will fail before the link behaves again
    failures: AtomicU32,
    calls: AtomicU32,
}

impl SimLink {
    pub fn new(latency_ms: u64) -> Self {
        Self {
            latency_ms,
            connected: AtomicBool::new(true),
            failures: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Make the next `n` calls time out
    pub fn inject_failures(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Calls made over the link so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Establish the link; injected failures only affect exchanges
    pub fn connect(&self) -> DriverResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(DriverError::NotConnected)
        }
    }

    /// One request/response exchange
    pub async fn exchange(&self, call: &str) -> DriverResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.is_connected() {
            return Err(DriverError::NotConnected);
        }

        if self.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;
        }

        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            trace!(call, "Injected failure");
            return Err(DriverError::Timeout(format!("no reply to {}", call)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let link = SimLink::new(0);
        link.inject_failures(2);
        assert!(link.exchange("get_freq").await.is_err());
        assert!(link.exchange("get_freq").await.is_err());
        assert!(link.exchange("get_freq").await.is_ok());
        assert_eq!(link.calls(), 3);
    }

    #[tokio::test]
    async fn test_disconnected_link() {
        let link = SimLink::new(0);
        link.inject_failures(1);
        assert!(link.connect().is_ok());
        link.set_connected(false);
        assert_eq!(link.connect(), Err(DriverError::NotConnected));
        assert_eq!(link.exchange("open").await, Err(DriverError::NotConnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency() {
        let link = SimLink::new(30);
        let start = tokio::time::Instant::now();
        link.exchange("get_strength").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
