//! Retry-delay scheduling for the message state machine.
//!
//! `delay` is a pure function of the attempt number and policy; the only
//! impurity — the jitter draw — is pushed behind an injectable source so
//! scenario tests can pin it to a known sequence instead of fighting
//! `fastrand`'s global generator.

use crate::config::{BackoffStrategy, RetryConfig};
use std::time::Duration;

/// Supplies the jitter term added to a computed delay. `bound` is the
/// exclusive upper bound in milliseconds; implementations must return a
/// value in `[0, bound)`.
pub trait JitterSource {
    fn next(&self, bound_millis: u64) -> u64;
}

/// Production jitter source, backed by `fastrand` — the same generator the
/// database retry wrapper uses.
pub struct FastrandJitter;

impl JitterSource for FastrandJitter {
    fn next(&self, bound_millis: u64) -> u64 {
        if bound_millis == 0 {
            0
        } else {
            fastrand::u64(0..bound_millis)
        }
    }
}

/// Jitter source that always returns zero, for deterministic tests.
pub struct ZeroJitter;

impl JitterSource for ZeroJitter {
    fn next(&self, _bound_millis: u64) -> u64 {
        0
    }
}

/// Jitter source that always returns a fixed value, for tests that want to
/// assert the jitter term was actually added.
pub struct FixedJitter(pub u64);

impl JitterSource for FixedJitter {
    fn next(&self, bound_millis: u64) -> u64 {
        self.0.min(bound_millis.saturating_sub(1))
    }
}

/// Computes the delay before the next retry of a message whose `attempt`-th
/// attempt just failed. `attempt` is normalized to `n = max(attempt, 1)`.
pub fn delay(attempt: u8, policy: &RetryConfig, jitter_source: &dyn JitterSource) -> Duration {
    let n = attempt.max(1);
    let retry_delay_ms = policy.retry_delay.as_millis() as u64;

    let base_ms = match policy.backoff_strategy {
        BackoffStrategy::Fixed => retry_delay_ms,
        BackoffStrategy::Linear => retry_delay_ms.saturating_mul(n as u64),
        BackoffStrategy::Exponential => {
            // RetryDelay * 2^(n-1), guarding against overflow before jitter.
            match 1u64.checked_shl((n - 1) as u32) {
                Some(factor) => retry_delay_ms.saturating_mul(factor),
                None => u64::MAX,
            }
        }
    };

    let jitter_ms = policy.jitter.as_millis() as u64;
    let with_jitter = if jitter_ms > 0 {
        base_ms.saturating_add(jitter_source.next(jitter_ms))
    } else {
        base_ms
    };

    let max_delay_ms = policy.max_delay.as_millis() as u64;
    let capped = if max_delay_ms > 0 {
        with_jitter.min(max_delay_ms)
    } else {
        with_jitter
    };

    Duration::from_millis(capped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackoffStrategy;

    fn policy(strategy: BackoffStrategy) -> RetryConfig {
        RetryConfig {
            max_retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
            backoff_strategy: strategy,
            jitter: Duration::ZERO,
            max_delay: Duration::from_secs(30),
        }
    }

    #[test]
    fn fixed_strategy_ignores_attempt_number() {
        let p = policy(BackoffStrategy::Fixed);
        assert_eq!(delay(1, &p, &ZeroJitter), Duration::from_secs(1));
        assert_eq!(delay(5, &p, &ZeroJitter), Duration::from_secs(1));
    }

    #[test]
    fn linear_strategy_scales_with_attempt() {
        let p = policy(BackoffStrategy::Linear);
        assert_eq!(delay(1, &p, &ZeroJitter), Duration::from_secs(1));
        assert_eq!(delay(3, &p, &ZeroJitter), Duration::from_secs(3));
    }

    #[test]
    fn exponential_strategy_doubles_each_attempt() {
        let p = policy(BackoffStrategy::Exponential);
        assert_eq!(delay(1, &p, &ZeroJitter), Duration::from_secs(1));
        assert_eq!(delay(2, &p, &ZeroJitter), Duration::from_secs(2));
        assert_eq!(delay(3, &p, &ZeroJitter), Duration::from_secs(4));
        assert_eq!(delay(4, &p, &ZeroJitter), Duration::from_secs(8));
    }

    #[test]
    fn attempt_zero_is_treated_as_one() {
        let p = policy(BackoffStrategy::Exponential);
        assert_eq!(delay(0, &p, &ZeroJitter), delay(1, &p, &ZeroJitter));
    }

    #[test]
    fn jitter_is_added_before_capping() {
        let mut p = policy(BackoffStrategy::Fixed);
        p.jitter = Duration::from_millis(500);
        let d = delay(1, &p, &FixedJitter(100));
        assert_eq!(d, Duration::from_millis(1100));
    }

    #[test_log::test]
    fn result_is_capped_at_max_delay() {
        let p = policy(BackoffStrategy::Exponential);
        // attempt 10 would be 512s uncapped, way past the 30s cap.
        assert_eq!(delay(10, &p, &ZeroJitter), Duration::from_secs(30));
    }

    #[test]
    fn zero_max_delay_disables_the_cap() {
        let mut p = policy(BackoffStrategy::Fixed);
        p.retry_delay = Duration::from_secs(100);
        p.max_delay = Duration::ZERO;
        assert_eq!(delay(1, &p, &ZeroJitter), Duration::from_secs(100));
    }

    #[test]
    fn exponential_overflow_saturates_instead_of_panicking() {
        let mut p = policy(BackoffStrategy::Exponential);
        p.retry_delay = Duration::from_secs(1);
        p.max_delay = Duration::from_secs(30);
        // attempt 255 would shift far past u64 range; must not panic and
        // must still end up clamped to max_delay.
        assert_eq!(delay(255, &p, &ZeroJitter), Duration::from_secs(30));
    }
}
