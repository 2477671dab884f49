//! Retry wrapper with exponential backoff
//!
//! Wraps remote reads and writes. It never triggers a connection reset;
//! composing the two is the caller's job (see the supervisor).

use std::future::Future;

use tokio::time::Instant;

use crate::config::RetryPolicy;

/// Bookkeeping for one in-flight retried operation
#[derive(Debug, Clone, Copy)]
pub struct RetryAttempt {
    /// 1-based attempt number
    pub attempt: u32,
    pub started_at: Instant,
}

impl RetryAttempt {
    fn first() -> Self {
        Self {
            attempt: 1,
            started_at: Instant::now(),
        }
    }

    fn next(self) -> Self {
        Self {
            attempt: self.attempt.saturating_add(1),
            started_at: self.started_at,
        }
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` is reached.
///
/// Between attempt `i` and `i + 1` (0-based) it sleeps
/// `min(base * 2^i, max)`. On exhaustion the last error is returned as is.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = RetryAttempt::first();

    loop {
        match op().await {
            Ok(value) => {
                if attempt.attempt > 1 {
                    tracing::info!(
                        attempt = attempt.attempt,
                        elapsed_ms = attempt.started_at.elapsed().as_millis() as u64,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(e) if attempt.attempt >= max_attempts => {
                tracing::warn!(
                    attempts = attempt.attempt,
                    elapsed_ms = attempt.started_at.elapsed().as_millis() as u64,
                    error = %e,
                    "Operation failed, retries exhausted"
                );
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_for(attempt.attempt - 1);
                tracing::debug!(
                    attempt = attempt.attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt = attempt.next();
            }
        }
    }
}
