//! Retry helper for transient database failures.
//!
//! This is distinct from the message-level retry scheduler in
//! [`crate::retry`]: it retries a single repository *call* (pool timeout,
//! connection reset) a handful of times before surfacing a
//! [`RepositoryError`], and never counts against a message's own
//! `attempts` budget.

use crate::errors::{RepositoryError, RepositoryResult};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for database retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::for_writes()
    }
}

impl RetryConfig {
    /// Conservative policy for read operations (claim queries, lookups).
    pub fn for_reads() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(500),
            backoff_multiplier: 1.5,
            jitter: true,
        }
    }

    /// Slightly more patient policy for the mutations the dispatcher issues
    /// after a publish attempt (`MarkSent`, `MarkFailed`, `MarkForRetry`).
    pub fn for_writes() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(3),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Runs `operation` up to `config.max_attempts` times, retrying only on
/// errors `is_retryable_error` classifies as transient.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
    operation_name: &str,
) -> RepositoryResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = RepositoryResult<T>>,
{
    let mut last_error = None;

    for attempt in 1..=config.max_attempts {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt, config.max_attempts, "database operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_retryable_error(&err) {
                    debug!(
                        operation = operation_name,
                        error = %err,
                        "database operation failed with non-retryable error"
                    );
                    return Err(err);
                }

                last_error = Some(err);

                if attempt < config.max_attempts {
                    let delay = calculate_delay(config, attempt);
                    warn!(
                        operation = operation_name,
                        attempt,
                        config.max_attempts,
                        ?delay,
                        error = %last_error.as_ref().unwrap(),
                        "database operation failed, retrying"
                    );
                    sleep(delay).await;
                } else {
                    warn!(
                        operation = operation_name,
                        config.max_attempts,
                        error = %last_error.as_ref().unwrap(),
                        "database operation exhausted retries"
                    );
                }
            }
        }
    }

    Err(last_error.unwrap())
}

fn is_retryable_error(error: &RepositoryError) -> bool {
    match error {
        RepositoryError::Database(sqlx_error) => match sqlx_error {
            sqlx::Error::PoolTimedOut => true,
            sqlx::Error::PoolClosed => true,
            sqlx::Error::Io(_) => true,
            _ => {
                let msg = sqlx_error.to_string().to_lowercase();
                msg.contains("connection reset")
                    || msg.contains("timeout")
                    || msg.contains("too many connections")
            }
        },
        RepositoryError::DuplicateId { .. }
        | RepositoryError::NotFound { .. }
        | RepositoryError::Serialization(_) => false,
    }
}

fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponential_delay = config.initial_delay.as_millis() as f64
        * config.backoff_multiplier.powi((attempt - 1) as i32);

    let delay_ms = exponential_delay.min(config.max_delay.as_millis() as f64) as u64;

    let final_delay = if config.jitter {
        let jitter_range = (delay_ms / 4).max(10);
        let jitter = fastrand::u64(0..=jitter_range);
        delay_ms + jitter
    } else {
        delay_ms
    };

    Duration::from_millis(final_delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_pool_timeout_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        };

        let result = with_retry(
            &config,
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
                    } else {
                        Ok(42)
                    }
                }
            },
            "test_op",
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_not_found() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig::for_writes();

        let result: RepositoryResult<()> = with_retry(
            &config,
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(RepositoryError::NotFound { id: "1".to_string() }) }
            },
            "test_op",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
