// Retry and timing wrappers applied at external-call sites.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

/// Errors that may succeed if the same call is repeated.
pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

/// Bounded attempts with a fixed delay between them.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts including the first (minimum 1).
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up. Returns the last error in the latter cases.
pub async fn with_retry<F, Fut, T, E>(operation: &str, policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    error = %e,
                    delay_ms = policy.delay.as_millis() as u64,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(operation, attempt, max_attempts, error = %e, "giving up");
                return Err(e);
            }
        }
    }
}

/// Awaits `fut` and logs how long it took.
pub async fn with_timing<Fut, T, E>(operation: &str, fut: Fut) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let result = fut.await;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    match &result {
        Ok(_) => debug!(operation, elapsed_ms, "completed"),
        Err(e) => error!(operation, elapsed_ms, error = %e, "failed"),
    }
    result
}
