//! Backoff computation.

use crate::policy::RetryPolicy;
use rand::Rng;
use std::time::Duration;

/// Computes the delay before the given attempt (1-based), with jitter.
///
/// `delay = min(max_delay, base_delay * 2^(attempt-1)) * (1 - jitter * r)`
/// where `r` is uniform in `[0, 1)`. Jitter only ever shortens the delay,
/// so the exponential cap is also the worst case.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    jittered_delay(policy, attempt, rand::rng().random_range(0.0..1.0))
}

pub(crate) fn jittered_delay(policy: &RetryPolicy, attempt: u32, r: f64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(32);
    let raw_ms = policy.base_delay.as_millis() as f64 * 2f64.powi(exponent as i32);
    let capped_ms = raw_ms.min(policy.max_delay.as_millis() as f64);
    Duration::from_millis((capped_ms * (1.0 - policy.jitter_factor * r)) as u64)
}
