use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use migrator_logging::{migrator_error, migrator_warn};

use crate::types::Retryable;

/// Retry budget applied to every remote call: `max_attempts` tries, waiting
/// `base_delay * multiplier^n` after the n-th failure. Only transient errors
/// are retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// The waits between attempts, in order.
    pub fn delays(&self) -> Vec<Duration> {
        let mut backoff = self.backoff();
        (1..self.max_attempts)
            .map(|_| backoff.next_backoff().unwrap_or(self.base_delay))
            .collect()
    }

    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut backoff = self.backoff();
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = backoff.next_backoff().unwrap_or(self.base_delay);
                    migrator_warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        label,
                        attempt,
                        max_attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        migrator_error!("{} failed after {} attempts: {}", label, attempt, err);
                    }
                    return Err(err);
                }
            }
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        let ceiling = self
            .base_delay
            .saturating_mul(1u32 << self.max_attempts.min(16));
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            randomization_factor: 0.0,
            multiplier: self.multiplier,
            max_interval: ceiling,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::RetryPolicy;
    use crate::types::{FailureKind, FetchError};

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    #[test]
    fn delays_double_from_the_base() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        let millis: Vec<u128> = policy.delays().iter().map(Duration::as_millis).collect();
        assert_eq!(millis, vec![100, 200, 400]);
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = instant_policy(3)
            .run("op", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(FetchError::new(FailureKind::HttpStatus(503), "busy"))
                } else {
                    Ok("done")
                }
            })
            .await;
        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn budget_is_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FetchError> = instant_policy(3)
            .run("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::new(FailureKind::Timeout, "slow"))
            })
            .await;
        assert_eq!(result.unwrap_err().kind, FailureKind::Timeout);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_do_not_consume_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FetchError> = instant_policy(5)
            .run("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::new(FailureKind::HttpStatus(404), "missing"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
