//! The keyed bucket store.

use crate::bucket::Bucket;
use crate::config::{RateLimiterConfig, Strategy};
use crate::error::RateLimiterError;
use crate::events::RateLimiterEvent;
use hashbrown::HashMap;
use httpshield_core::headers::ServerRateLimit;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

#[cfg(feature = "metrics")]
use metrics::counter;

/// The circuit breaker state a caller observed for the same destination,
/// passed in as an advisory signal when `adaptive` is enabled.
///
/// The limiter deliberately does not depend on the circuit breaker crate;
/// callers map their state into this enum. Staleness is acceptable, the
/// coordination is advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircuitAdvisory {
    /// Circuit closed or absent: full capacity.
    #[default]
    Closed,
    /// Circuit half-open: capacity scaled to 50%.
    HalfOpen,
    /// Circuit open: capacity scaled to 10%.
    Open,
}

impl CircuitAdvisory {
    pub(crate) fn scale(self) -> f64 {
        match self {
            CircuitAdvisory::Closed => 1.0,
            CircuitAdvisory::HalfOpen => 0.5,
            CircuitAdvisory::Open => 0.1,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            CircuitAdvisory::Closed => "closed",
            CircuitAdvisory::HalfOpen => "half_open",
            CircuitAdvisory::Open => "open",
        }
    }
}

/// Outcome of a non-consuming [`RateLimiterStore::check`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// A token is available; `remaining` counts tokens left if one were
    /// consumed now.
    Allowed { remaining: f64 },
    /// No token is available for approximately `wait`.
    Denied { wait: Duration },
    /// The policy is disabled.
    Disabled,
}

/// A point-in-time snapshot of one bucket.
#[derive(Debug, Clone, Copy)]
pub struct BucketState {
    /// Tokens currently in the bucket.
    pub tokens: f64,
    /// When the bucket was last refilled.
    pub last_refill: Instant,
}

/// A concurrent store of per-key token buckets.
///
/// Every operation performs its read-modify-write inside one short critical
/// section, so concurrent consumes on the same key linearize: a token is
/// either fully consumed or the call is denied, never decremented and lost.
#[derive(Default)]
pub struct RateLimiterStore {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiterStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether a token is available without consuming one.
    pub fn check(&self, key: &str, config: &RateLimiterConfig) -> Decision {
        self.check_with(key, config, CircuitAdvisory::Closed)
    }

    /// [`check`](Self::check) with an explicit circuit advisory.
    pub fn check_with(
        &self,
        key: &str,
        config: &RateLimiterConfig,
        advisory: CircuitAdvisory,
    ) -> Decision {
        if !config.enabled {
            return Decision::Disabled;
        }
        if config.requests == 0 {
            return Decision::Denied {
                wait: Duration::MAX,
            };
        }

        let scale = effective_scale(config, advisory);
        let mut buckets = self.buckets.lock();
        let now = Instant::now();
        let bucket = buckets
            .entry_ref(key)
            .or_insert_with(|| Bucket::full(config.max_tokens(), now));
        bucket.refill(now, config.max_tokens(), config.refill_rate_per_ms());

        let effective = bucket.tokens.min(config.max_tokens() * scale);
        if effective >= 1.0 {
            Decision::Allowed {
                remaining: effective - 1.0,
            }
        } else {
            Decision::Denied {
                wait: wait_for_one_token(effective, config.refill_rate_per_ms() * scale),
            }
        }
    }

    /// Consumes one token, sleeping under the `wait` strategy if necessary.
    ///
    /// Returns the tokens remaining after the consume, or the rejection.
    pub async fn consume(
        &self,
        key: &str,
        config: &RateLimiterConfig,
    ) -> Result<f64, RateLimiterError> {
        self.consume_with(key, config, CircuitAdvisory::Closed).await
    }

    /// [`consume`](Self::consume) with an explicit circuit advisory.
    pub async fn consume_with(
        &self,
        key: &str,
        config: &RateLimiterConfig,
        advisory: CircuitAdvisory,
    ) -> Result<f64, RateLimiterError> {
        if !config.enabled {
            return Ok(config.max_tokens());
        }

        if config.adaptive && advisory != CircuitAdvisory::Closed {
            let scale = advisory.scale();
            config
                .event_listeners
                .emit(&RateLimiterEvent::AdaptiveReduction {
                    key: key.to_string(),
                    timestamp: Instant::now(),
                    original_rate: config.max_tokens(),
                    adjusted_rate: config.max_tokens() * scale,
                    reduction_factor: scale,
                    circuit_state: advisory.as_str(),
                });

            #[cfg(feature = "tracing")]
            tracing::debug!(
                key,
                circuit_state = advisory.as_str(),
                reduction_factor = scale,
                "rate limit capacity reduced by circuit advisory"
            );
        }

        let mut waited = Duration::ZERO;
        loop {
            match self.try_consume(key, config, advisory) {
                Ok(remaining) => {
                    config.event_listeners.emit(&RateLimiterEvent::Consumed {
                        key: key.to_string(),
                        timestamp: Instant::now(),
                        remaining,
                    });

                    #[cfg(feature = "metrics")]
                    counter!("ratelimiter_consumes_total", "limiter" => config.name.clone(), "outcome" => "ok")
                        .increment(1);

                    return Ok(remaining);
                }
                Err(wait) => match config.strategy {
                    Strategy::Error => {
                        return self.reject(key, config);
                    }
                    Strategy::Wait => {
                        if wait > config.max_wait_time.saturating_sub(waited) {
                            return self.reject(key, config);
                        }

                        config.event_listeners.emit(&RateLimiterEvent::Waiting {
                            key: key.to_string(),
                            timestamp: Instant::now(),
                            wait,
                            strategy: config.strategy,
                        });

                        #[cfg(feature = "tracing")]
                        tracing::trace!(key, wait_ms = wait.as_millis() as u64, "waiting for rate limit token");

                        sleep(wait).await;
                        waited += wait;
                    }
                },
            }
        }
    }

    /// Removes a bucket, resetting the key to full capacity on next use.
    pub fn reset(&self, key: &str) {
        self.buckets.lock().remove(key);
    }

    /// Returns a snapshot of the bucket for `key`, if one exists.
    pub fn state(&self, key: &str) -> Option<BucketState> {
        self.buckets.lock().get(key).map(|b| BucketState {
            tokens: b.tokens,
            last_refill: b.last_refill,
        })
    }

    /// Overwrites the bucket with quota a server advertised.
    ///
    /// The token count becomes exactly `remaining` and the refill clock
    /// restarts now; the next refill clamps against the configured
    /// capacity as usual.
    pub fn sync_from_server(
        &self,
        key: &str,
        server: &ServerRateLimit,
        config: &RateLimiterConfig,
    ) {
        let remaining = server.remaining as f64;
        {
            let mut buckets = self.buckets.lock();
            let now = Instant::now();
            let bucket = buckets
                .entry_ref(key)
                .or_insert_with(|| Bucket::full(config.max_tokens(), now));
            bucket.tokens = remaining;
            bucket.last_refill = now;
        }

        config.event_listeners.emit(&RateLimiterEvent::Synced {
            key: key.to_string(),
            timestamp: Instant::now(),
            remaining,
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(key, remaining, "bucket synchronized from server headers");
    }

    /// Removes buckets idle longer than `ttl`. The janitor calls this on a
    /// fixed cadence; it is also safe to call directly.
    pub fn purge_idle(&self, ttl: Duration) {
        let now = Instant::now();
        self.buckets
            .lock()
            .retain(|_, bucket| now.duration_since(bucket.last_refill) < ttl);
    }

    /// Spawns the background janitor. Best-effort: the handle may simply be
    /// aborted at shutdown.
    pub fn spawn_janitor(
        self: &Arc<Self>,
        interval: Duration,
        ttl: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.purge_idle(ttl);
            }
        })
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    /// Returns true when no buckets exist.
    pub fn is_empty(&self) -> bool {
        self.buckets.lock().is_empty()
    }

    /// One locked read-modify-write: refill, then consume or compute the
    /// wait until a token is available.
    ///
    /// The bucket persists unscaled state; the advisory only narrows what
    /// this call may take from it.
    fn try_consume(
        &self,
        key: &str,
        config: &RateLimiterConfig,
        advisory: CircuitAdvisory,
    ) -> Result<f64, Duration> {
        if config.requests == 0 {
            return Err(Duration::MAX);
        }

        let scale = effective_scale(config, advisory);
        let mut buckets = self.buckets.lock();
        let now = Instant::now();
        let bucket = buckets
            .entry_ref(key)
            .or_insert_with(|| Bucket::full(config.max_tokens(), now));
        bucket.refill(now, config.max_tokens(), config.refill_rate_per_ms());

        let effective = bucket.tokens.min(config.max_tokens() * scale);
        if effective >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(bucket.tokens.min(config.max_tokens() * scale))
        } else {
            Err(wait_for_one_token(
                effective,
                config.refill_rate_per_ms() * scale,
            ))
        }
    }

    fn reject<T>(&self, key: &str, config: &RateLimiterConfig) -> Result<T, RateLimiterError> {
        config.event_listeners.emit(&RateLimiterEvent::Exceeded {
            key: key.to_string(),
            timestamp: Instant::now(),
            strategy: config.strategy,
        });

        #[cfg(feature = "metrics")]
        counter!("ratelimiter_consumes_total", "limiter" => config.name.clone(), "outcome" => "rejected")
            .increment(1);

        #[cfg(feature = "tracing")]
        tracing::debug!(key, strategy = config.strategy.as_str(), "rate limit exceeded");

        Err(match config.strategy {
            Strategy::Error => RateLimiterError::Exceeded,
            Strategy::Wait => RateLimiterError::WaitTimeout,
        })
    }
}

fn effective_scale(config: &RateLimiterConfig, advisory: CircuitAdvisory) -> f64 {
    if config.adaptive {
        advisory.scale()
    } else {
        1.0
    }
}

fn wait_for_one_token(effective_tokens: f64, rate_per_ms: f64) -> Duration {
    if rate_per_ms <= 0.0 {
        return Duration::MAX;
    }
    let deficit_ms = (1.0 - effective_tokens) / rate_per_ms;
    Duration::from_secs_f64((deficit_ms / 1_000.0).max(0.0))
}
