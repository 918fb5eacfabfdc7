// src/retry/strategy.rs

use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryStrategy {
    config: RetryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

impl RetryStrategy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute a function with retry logic. `should_retry` decides whether
    /// an error is transient; permanent errors are returned immediately.
    pub async fn execute_with_decision<F, Fut, T, E>(
        &self,
        mut f: F,
        should_retry: impl Fn(&E) -> RetryDecision,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);

            match f().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if should_retry(&error) == RetryDecision::NoRetry {
                        debug!("Error is non-retryable: {}", error);
                        return Err(error);
                    }

                    if !self.config.is_unlimited() && attempt >= self.config.max_attempts {
                        warn!("Retry failed after {} attempts: {}", attempt, error);
                        return Err(error);
                    }

                    let backoff = self.calculate_backoff(attempt);
                    warn!(
                        "Attempt {} failed: {}. Retrying in {:?}",
                        attempt, error, backoff
                    );

                    sleep(backoff).await;
                }
            }
        }
    }

    /// Calculate exponential backoff with jitter
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_base().as_millis() as u64;
        let max = self.config.backoff_max().as_millis() as u64;

        // Exponential backoff: base * 2^(attempt - 1)
        let exponential =
            base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));

        let capped = exponential.min(max);

        // Jitter of 0-25% on top of the capped value
        let jitter = (capped as f64 * rand::random::<f64>() * 0.25) as u64;

        Duration::from_millis(capped + jitter)
    }
}
