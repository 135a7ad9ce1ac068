// ── Retry/backoff engine ──
//
// Runs one logical request as a bounded sequence of attempts. The engine is
// generic over the operation and only looks at `Error::is_transient` to
// decide between "retry" and "give up now".

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Error;

/// Bounded retry with exponential backoff.
///
/// `retries` is the number of *extra* attempts: `retries = 0` means a
/// single attempt. After failed attempt `n` (1-based) the engine sleeps
/// `backoff * 2^n` before attempt `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub const fn new(retries: u32, backoff: Duration) -> Self {
        Self { retries, backoff }
    }

    /// Total attempts this policy allows.
    pub const fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Sleep inserted after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2_u32.saturating_pow(attempt))
    }

    /// Worst-case time spent sleeping between attempts.
    pub fn total_backoff(&self) -> Duration {
        (1..=self.retries).fold(Duration::ZERO, |acc, n| {
            acc.saturating_add(self.delay_after(n))
        })
    }
}

/// Run `op` until it succeeds, fails terminally, or the policy is used up.
///
/// `op` receives the 1-based attempt number. Attempts are strictly
/// sequential. Terminal errors are returned unchanged after one attempt;
/// exhausting the policy yields [`Error::RetryExhausted`] carrying
/// `address`, the number of attempts made and the last error.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, address: &str, mut op: F) -> Result<T, Error>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(address, attempt, "request succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) if attempt >= max_attempts => {
                warn!(address, attempts = attempt, error = %err, "retries exhausted");
                return Err(Error::RetryExhausted {
                    address: address.to_owned(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            }
            Err(err) => {
                let delay = policy.delay_after(attempt);
                debug!(
                    address,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
