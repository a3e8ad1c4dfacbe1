//! Retry with exponential backoff for recoverable errors

use std::fmt;
use std::future::Future;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};

use crate::error::{Result, ServiceError};

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 means no retries)
    pub max_retries: u32,

    /// Initial backoff duration
    pub initial_interval: Duration,

    /// Maximum backoff duration
    pub max_interval: Duration,

    /// Multiplier for backoff between retries
    pub multiplier: f64,

    /// Randomization applied to each backoff interval
    pub randomization_factor: f64,

    /// Maximum total time to spend retrying
    pub max_elapsed_time: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(4),
            multiplier: 2.0,
            randomization_factor: 0.2,
            max_elapsed_time: Some(Duration::from_secs(20)),
        }
    }
}

impl RetryConfig {
    /// A policy that never retries
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

impl fmt::Display for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RetryConfig {{ max_retries: {}, initial_interval: {:?}, max_interval: {:?}, multiplier: {}, max_elapsed_time: {:?} }}",
            self.max_retries, self.initial_interval, self.max_interval, self.multiplier, self.max_elapsed_time
        )
    }
}

/// Executor for retry operations with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute a fallible operation, retrying retryable errors according to
    /// the configuration
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            multiplier: self.config.multiplier,
            randomization_factor: self.config.randomization_factor,
            max_elapsed_time: self.config.max_elapsed_time,
            ..ExponentialBackoff::default()
        };
        backoff.reset();

        let mut attempts = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if self.should_retry(&err) && attempts < self.config.max_retries => {
                    match backoff.next_backoff() {
                        Some(delay) => {
                            log::warn!(
                                "Retryable failure, retrying in {:?} (attempt {}/{}): {}",
                                delay,
                                attempts + 1,
                                self.config.max_retries,
                                err
                            );
                            tokio::time::sleep(delay).await;
                            attempts += 1;
                        }
                        None => return Err(err.with_context_value("attempts", attempts + 1)),
                    }
                }
                Err(err) if attempts > 0 => return Err(err.with_context_value("attempts", attempts + 1)),
                Err(err) => return Err(err),
            }
        }
    }

    fn should_retry(&self, error: &ServiceError) -> bool {
        error.is_retryable()
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_interval: Duration::from_millis(5),
            max_interval: Duration::from_millis(20),
            ..RetryConfig::default()
        }
    }

    #[tokio::test]
    async fn test_retry_on_failure() {
        let attempts = AtomicUsize::new(0);
        let retry = RetryExecutor::new(fast_config(2));

        let result = retry
            .execute(|| async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ServiceError::network("connection reset"))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_on_non_retryable_error() {
        let attempts = AtomicUsize::new(0);
        let retry = RetryExecutor::new(fast_config(3));

        let result: Result<()> = retry
            .execute(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::validation("bad request"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_policy_runs_once() {
        let attempts = AtomicUsize::new(0);
        let retry = RetryExecutor::new(RetryConfig::disabled());

        let result: Result<()> = retry
            .execute(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::timeout("slow upstream"))
            })
            .await;

        assert!(result.unwrap_err().is_timeout());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
