//! # Retry Policy
//!
//! Bounded retry with jittered exponential backoff for outbound collaborator
//! calls. Only errors classified transient by
//! [`MissionControlError::is_transient`] are retried; everything else
//! surfaces immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::{MissionControlError, MissionResult};

/// Retry configuration applied by the external client
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first (1 = no retry)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Delay before retry number `attempt` (1-based), exponentially grown
    /// and jittered into `[d/2, d]` to avoid thundering herds.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(self.max_delay);
        capped.mul_f64(0.5 + fastrand::f64() * 0.5)
    }

    /// Run `op`, retrying transient failures up to the attempt budget.
    ///
    /// The closure is re-invoked per attempt so each retry issues a fresh
    /// request.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut op: F) -> MissionResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = MissionResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        operation = %operation,
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
