//! The token bucket itself.

use std::time::Instant;

/// State for one rate-limit key: a token count and the instant it was last
/// refilled. All derived values (capacity, refill rate) live in the config
/// so that buckets survive config changes between requests.
#[derive(Debug, Clone, Copy)]
pub struct Bucket {
    pub(crate) tokens: f64,
    pub(crate) last_refill: Instant,
}

impl Bucket {
    /// A freshly created bucket starts at full capacity.
    pub(crate) fn full(max_tokens: f64, now: Instant) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: now,
        }
    }

    /// Refills proportionally to elapsed time and clamps at `max_tokens`.
    ///
    /// The clamp is what keeps idle buckets from accumulating unbounded
    /// burst capacity.
    pub(crate) fn refill(&mut self, now: Instant, max_tokens: f64, rate_per_ms: f64) {
        let elapsed_ms = now.duration_since(self.last_refill).as_secs_f64() * 1_000.0;
        self.tokens = (self.tokens + elapsed_ms * rate_per_ms).min(max_tokens);
        self.last_refill = now;
    }
}
