//! Property tests for retry backoff.
//!
//! Invariants tested:
//! - The delay never exceeds min(max_delay, base * 2^(attempt-1))
//! - Jitter only shortens a delay, by at most the jitter factor
//! - Large attempt numbers never overflow or exceed the cap

use httpshield_retry::{backoff_delay, RetryPolicy};
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn delays_stay_within_the_envelope(
        base_ms in 1_u64..5_000,
        max_ms in 1_u64..120_000,
        jitter in 0.0_f64..1.0,
        attempt in 1_u32..64,
    ) {
        let policy = RetryPolicy::builder()
            .base_delay(Duration::from_millis(base_ms))
            .max_delay(Duration::from_millis(max_ms))
            .jitter_factor(jitter)
            .build();

        let delay = backoff_delay(&policy, attempt);

        let uncapped = (base_ms as f64) * 2_f64.powi(attempt.saturating_sub(1).min(32) as i32);
        let cap_ms = uncapped.min(max_ms as f64);

        prop_assert!(delay.as_millis() as f64 <= cap_ms + 1.0);
        // Jitter subtracts at most jitter * cap (plus truncation).
        prop_assert!(delay.as_millis() as f64 >= cap_ms * (1.0 - jitter) - 1.0);
    }

    #[test]
    fn zero_jitter_is_deterministic(
        base_ms in 1_u64..1_000,
        attempt in 1_u32..16,
    ) {
        let policy = RetryPolicy::builder()
            .base_delay(Duration::from_millis(base_ms))
            .max_delay(Duration::from_secs(3_600))
            .jitter_factor(0.0)
            .build();

        let first = backoff_delay(&policy, attempt);
        let second = backoff_delay(&policy, attempt);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn huge_attempts_never_panic(attempt in 1_u32..u32::MAX) {
        let policy = RetryPolicy::builder()
            .base_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(30))
            .jitter_factor(0.2)
            .build();

        let delay = backoff_delay(&policy, attempt);
        prop_assert!(delay <= Duration::from_secs(30));
    }
}
