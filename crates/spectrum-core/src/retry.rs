//! Bounded retry with exponential backoff for device calls
//!
//! A failed attempt `k` (counting from 0) is followed by a pause of
//! `interval * 2^k` before the next one. A call is attempted at most
//! `retries + 1` times; the last failure becomes a [`DeviceError`].

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DeviceError, DriverResult};

/// Read-back frequencies closer than this to the target count as a match
const FREQ_TOLERANCE_HZ: f64 = 0.5;

/// Retry settings for one worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    #[serde(default)]
    pub retries: u32,
    /// Base backoff interval in milliseconds
    #[serde(default)]
    pub interval_ms: u64,
    /// Set/read-back rounds before a frequency is declared unreachable
    /// (0 = set once and trust the device)
    #[serde(default)]
    pub set_check: u32,
}

impl RetryPolicy {
    pub fn new(retries: u32, interval_ms: u64) -> Self {
        Self {
            retries,
            interval_ms,
            set_check: 0,
        }
    }

    pub fn with_set_check(mut self, set_check: u32) -> Self {
        self.set_check = set_check;
        self
    }

    /// Pause after failed attempt `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(
            self.interval_ms
                .saturating_mul(2u64.saturating_pow(attempt)),
        )
    }

    /// Total attempts a call may make
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Outcome of a set-and-verify cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tuning {
    /// Device accepted the value
    Applied,
    /// Read-back never matched within the verify budget
    Unreachable,
}

/// Runs device calls under a [`RetryPolicy`]
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `call` until it succeeds or the policy is exhausted
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, DeviceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DriverResult<T>>,
    {
        let max_attempts = self.policy.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        warn!(operation, attempts = attempt, %e, "Device call failed");
                        return Err(DeviceError::Exhausted {
                            operation: operation.to_string(),
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }
                    let delay = self.policy.backoff(attempt - 1);
                    debug!(operation, attempt, max_attempts, ?delay, %e, "Retrying device call");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Apply a frequency and, if the policy asks for it, confirm it by
    /// reading it back.
    ///
    /// With `set_check = 0` the value is set once (with retries) and trusted.
    /// Otherwise up to `set_check` set/read-back rounds are made; if none
    /// reads back the target the frequency is [`Tuning::Unreachable`]. Only
    /// exhausted retries on the individual calls are errors.
    pub async fn set_and_verify<S, SFut, R, RFut>(
        &self,
        target: f64,
        mut set: S,
        mut read_back: R,
    ) -> Result<Tuning, DeviceError>
    where
        S: FnMut() -> SFut,
        SFut: Future<Output = DriverResult<()>>,
        R: FnMut() -> RFut,
        RFut: Future<Output = DriverResult<f64>>,
    {
        if self.policy.set_check == 0 {
            self.run("set_freq", &mut set).await?;
            return Ok(Tuning::Applied);
        }

        for round in 1..=self.policy.set_check {
            self.run("set_freq", &mut set).await?;
            let actual = self.run("get_freq", &mut read_back).await?;
            if (actual - target).abs() < FREQ_TOLERANCE_HZ {
                return Ok(Tuning::Applied);
            }
            debug!(target, actual, round, "Frequency read-back mismatch");
        }

        debug!(target, budget = self.policy.set_check, "Frequency unreachable");
        Ok(Tuning::Unreachable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(4, 50);
        assert_eq!(policy.backoff(0), Duration::from_millis(50));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.max_attempts(), 5);
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::new(100, u64::MAX / 2);
        assert_eq!(policy.backoff(70), Duration::from_millis(u64::MAX));
    }

    #[tokio::test]
    async fn test_succeeds_first_time() {
        let exec = RetryExecutor::new(RetryPolicy::new(3, 10));
        let result = exec.run("get_strength", || async { Ok(-42.0) }).await;
        assert_eq!(result, Ok(-42.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_call_is_attempted_retries_plus_one_times() {
        let exec = RetryExecutor::new(RetryPolicy::new(2, 100));
        let mut calls = Vec::new();

        let result: Result<(), _> = exec
            .run("get_strength", || {
                calls.push(Instant::now());
                async { Err(DriverError::Timeout("no answer".to_string())) }
            })
            .await;

        assert_eq!(calls.len(), 3);
        let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(gaps[0], Duration::from_millis(100));
        assert_eq!(gaps[1], Duration::from_millis(200));

        assert_eq!(
            result,
            Err(DeviceError::Exhausted {
                operation: "get_strength".to_string(),
                attempts: 3,
                message: "Timeout: no answer".to_string(),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let exec = RetryExecutor::new(RetryPolicy::new(3, 10));
        let attempts = AtomicU32::new(0);

        let result = exec
            .run("set_freq", || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(DriverError::NotConnected)
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_fails_after_single_attempt() {
        let exec = RetryExecutor::new(RetryPolicy::default());
        let result: Result<(), _> = exec
            .run("open", || async { Err(DriverError::Io("gone".to_string())) })
            .await;
        assert!(matches!(
            result,
            Err(DeviceError::Exhausted { attempts: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_set_and_verify_unreachable_is_not_an_error() {
        let exec = RetryExecutor::new(RetryPolicy::new(0, 0).with_set_check(3));
        let sets = AtomicU32::new(0);
        let reads = AtomicU32::new(0);

        let outcome = exec
            .set_and_verify(
                96.1e6,
                || {
                    sets.fetch_add(1, Ordering::SeqCst);
                    async { Ok(()) }
                },
                || {
                    reads.fetch_add(1, Ordering::SeqCst);
                    async { Ok(96.0e6) }
                },
            )
            .await;

        assert_eq!(outcome, Ok(Tuning::Unreachable));
        assert_eq!(sets.load(Ordering::SeqCst), 3);
        assert_eq!(reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_set_and_verify_matches_on_second_round() {
        let exec = RetryExecutor::new(RetryPolicy::new(0, 0).with_set_check(3));
        let reads = AtomicU32::new(0);

        let outcome = exec
            .set_and_verify(
                1e6,
                || async { Ok(()) },
                || {
                    let n = reads.fetch_add(1, Ordering::SeqCst);
                    async move { Ok(if n == 0 { 0.0 } else { 1e6 }) }
                },
            )
            .await;

        assert_eq!(outcome, Ok(Tuning::Applied));
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_set_without_check_skips_read_back() {
        let exec = RetryExecutor::new(RetryPolicy::default());
        let reads = AtomicU32::new(0);

        let outcome = exec
            .set_and_verify(
                1e6,
                || async { Ok(()) },
                || {
                    reads.fetch_add(1, Ordering::SeqCst);
                    async { Ok(0.0) }
                },
            )
            .await;

        assert_eq!(outcome, Ok(Tuning::Applied));
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_set_and_verify_propagates_exhausted_set() {
        let exec = RetryExecutor::new(RetryPolicy::new(1, 0).with_set_check(2));
        let outcome = exec
            .set_and_verify(
                1e6,
                || async { Err(DriverError::Rejected("busy".to_string())) },
                || async { Ok(1e6) },
            )
            .await;

        match outcome {
            Err(DeviceError::Exhausted {
                attempts, operation, ..
            }) => {
                assert_eq!(attempts, 2);
                assert_eq!(operation, "set_freq");
            }
            other => panic!("expected exhausted retries, got {:?}", other),
        }
    }
}
