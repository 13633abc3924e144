use outbox_dispatcher::config::{BackoffStrategy, RetryConfig};
use outbox_dispatcher::retry::{delay, FixedJitter, ZeroJitter};
use proptest::prelude::*;
use std::time::Duration;

fn base_policy(strategy: BackoffStrategy, retry_delay_ms: u64) -> RetryConfig {
    RetryConfig {
        max_retry_attempts: 5,
        retry_delay: Duration::from_millis(retry_delay_ms),
        backoff_strategy: strategy,
        jitter: Duration::ZERO,
        max_delay: Duration::ZERO,
    }
}

proptest! {
    /// delay(n, exponential, jitter=0, maxDelay=0) = RetryDelay * 2^(n-1) for n >= 1.
    #[test]
    fn exponential_matches_closed_form(n in 1u8..20, retry_delay_ms in 1u64..1000) {
        let policy = base_policy(BackoffStrategy::Exponential, retry_delay_ms);
        let expected_ms = (retry_delay_ms as u128) * (1u128 << (n - 1));
        let expected = Duration::from_millis(expected_ms.min(u64::MAX as u128) as u64);
        prop_assert_eq!(delay(n, &policy, &ZeroJitter), expected);
    }

    /// delay(n, any, jitter=J, maxDelay=M) <= M + J when M > 0, and >= base(n) always
    /// (base(n) here taken with jitter forced to zero so the lower bound is exact).
    #[test]
    fn jitter_and_cap_bounds_hold(
        n in 1u8..10,
        retry_delay_ms in 1u64..100,
        jitter_ms in 0u64..50,
        max_delay_ms in 1u64..500,
    ) {
        let mut policy = base_policy(BackoffStrategy::Linear, retry_delay_ms);
        policy.jitter = Duration::from_millis(jitter_ms);
        policy.max_delay = Duration::from_millis(max_delay_ms);

        let base = delay(n, &{
            let mut p = policy.clone();
            p.jitter = Duration::ZERO;
            p.max_delay = Duration::ZERO;
            p
        }, &ZeroJitter);

        let got = delay(n, &policy, &FixedJitter(jitter_ms.saturating_sub(1)));

        prop_assert!(got <= Duration::from_millis(max_delay_ms + jitter_ms));
        prop_assert!(got >= base.min(Duration::from_millis(max_delay_ms)));
    }

    /// retry_attempts(attempts) = max(attempts - 1, 0)
    #[test]
    fn retry_attempts_matches_closed_form(attempts in 0i16..1000) {
        use outbox_dispatcher::models::OutboxMessage;
        use chrono::Utc;

        let message = OutboxMessage {
            id: uuid::Uuid::new_v4().to_string(),
            payload: "{}".to_string(),
            status: outbox_dispatcher::models::MessageStatus::Pending,
            attempts,
            available_at: Utc::now(),
            picked_at: None,
            created_at: Utc::now(),
        };

        let expected = (attempts - 1).max(0);
        prop_assert_eq!(message.retry_attempts(), expected);
    }
}
