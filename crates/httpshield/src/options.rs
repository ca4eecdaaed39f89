//! The engine's configuration surface.
//!
//! Options exist at two levels: per client ([`Engine`](crate::Engine)
//! construction) and per request. Per-request options override per-client
//! options field by field. Profiles are predefined bundles applied
//! underneath: explicit fields win over profile fields, profile fields win
//! over built-in defaults, and component bundles merge deeply rather than
//! replacing each other wholesale.
//!
//! Each resilience component is a [`Toggle`]: absent, disabled, or enabled
//! with its own option bundle. Resolution into concrete component configs
//! happens once, at request construction, never inside pipeline stages.

use crate::adapter::{AdapterOptions, Proxy};
use http::HeaderMap;
use httpshield_ratelimiter::{Per, Strategy};
use std::time::Duration;

/// Tri-state switch for one resilience component.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Toggle<T> {
    /// Inherit from the client options, profile, or built-in default.
    #[default]
    Default,
    /// Explicitly off.
    Disabled,
    /// Explicitly on, with options.
    Enabled(T),
}

impl<T> Toggle<T> {
    /// Returns true when nothing was specified.
    pub fn is_default(&self) -> bool {
        matches!(self, Toggle::Default)
    }

    fn shallow_over(self, base: Self) -> Self {
        match self {
            Toggle::Default => base,
            other => other,
        }
    }
}

impl<T: MergeOptions> Toggle<T> {
    fn deep_over(self, base: Self) -> Self {
        match (self, base) {
            (Toggle::Default, base) => base,
            (Toggle::Disabled, _) => Toggle::Disabled,
            (Toggle::Enabled(overlay), Toggle::Enabled(base)) => {
                Toggle::Enabled(overlay.merge_over(base))
            }
            (Toggle::Enabled(overlay), _) => Toggle::Enabled(overlay),
        }
    }
}

trait MergeOptions {
    /// Fieldwise merge; `self` wins where set.
    fn merge_over(self, base: Self) -> Self;
}

/// Rate limiter options; unset fields fall back to the component defaults.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RateLimitOptions {
    /// Explicit kill switch inside an otherwise-enabled bundle.
    pub enabled: Option<bool>,
    /// Request quota per window.
    pub requests: Option<u32>,
    /// Quota window.
    pub per: Option<Per>,
    /// Behavior on an empty bucket.
    pub strategy: Option<Strategy>,
    /// Wait budget for the `wait` strategy.
    pub max_wait_time: Option<Duration>,
    /// Circuit-state-driven capacity scaling.
    pub adaptive: Option<bool>,
}

impl RateLimitOptions {
    /// Creates an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request quota per window.
    pub fn requests(mut self, requests: u32) -> Self {
        self.requests = Some(requests);
        self
    }

    /// Sets the quota window.
    pub fn per(mut self, per: Per) -> Self {
        self.per = Some(per);
        self
    }

    /// Sets the empty-bucket strategy.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Sets the wait budget.
    pub fn max_wait_time(mut self, max_wait_time: Duration) -> Self {
        self.max_wait_time = Some(max_wait_time);
        self
    }

    /// Enables adaptive capacity scaling.
    pub fn adaptive(mut self, adaptive: bool) -> Self {
        self.adaptive = Some(adaptive);
        self
    }
}

impl MergeOptions for RateLimitOptions {
    fn merge_over(self, base: Self) -> Self {
        Self {
            enabled: self.enabled.or(base.enabled),
            requests: self.requests.or(base.requests),
            per: self.per.or(base.per),
            strategy: self.strategy.or(base.strategy),
            max_wait_time: self.max_wait_time.or(base.max_wait_time),
            adaptive: self.adaptive.or(base.adaptive),
        }
    }
}

/// Circuit breaker options; unset fields fall back to the component
/// defaults.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CircuitBreakerOptions {
    /// Explicit kill switch inside an otherwise-enabled bundle.
    pub enabled: Option<bool>,
    /// Absolute failure count that opens the circuit.
    pub failure_threshold: Option<u32>,
    /// Failure percentage that opens a full window.
    pub failure_threshold_percentage: Option<u8>,
    /// Outcome window size.
    pub window_size: Option<usize>,
    /// Open-state duration before probing.
    pub timeout: Option<Duration>,
    /// Half-open probe budget.
    pub half_open_requests: Option<u32>,
}

impl CircuitBreakerOptions {
    /// Creates an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the absolute failure threshold.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    /// Sets the percentage threshold.
    pub fn failure_threshold_percentage(mut self, percentage: u8) -> Self {
        self.failure_threshold_percentage = Some(percentage);
        self
    }

    /// Sets the outcome window size.
    pub fn window_size(mut self, size: usize) -> Self {
        self.window_size = Some(size);
        self
    }

    /// Sets the open-state duration.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the half-open probe budget.
    pub fn half_open_requests(mut self, requests: u32) -> Self {
        self.half_open_requests = Some(requests);
        self
    }
}

impl MergeOptions for CircuitBreakerOptions {
    fn merge_over(self, base: Self) -> Self {
        Self {
            enabled: self.enabled.or(base.enabled),
            failure_threshold: self.failure_threshold.or(base.failure_threshold),
            failure_threshold_percentage: self
                .failure_threshold_percentage
                .or(base.failure_threshold_percentage),
            window_size: self.window_size.or(base.window_size),
            timeout: self.timeout.or(base.timeout),
            half_open_requests: self.half_open_requests.or(base.half_open_requests),
        }
    }
}

/// Deduplication options; unset fields fall back to the component
/// defaults.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DedupOptions {
    /// Explicit kill switch inside an otherwise-enabled bundle.
    pub enabled: Option<bool>,
    /// How long completed responses stay reusable.
    pub ttl: Option<Duration>,
    /// Explicit dedup key overriding the fingerprint.
    pub key: Option<String>,
}

impl DedupOptions {
    /// Creates an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the completed-response TTL.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Overrides the fingerprint with an explicit key.
    pub fn key<S: Into<String>>(mut self, key: S) -> Self {
        self.key = Some(key.into());
        self
    }
}

impl MergeOptions for DedupOptions {
    fn merge_over(self, base: Self) -> Self {
        Self {
            enabled: self.enabled.or(base.enabled),
            ttl: self.ttl.or(base.ttl),
            key: self.key.or(base.key),
        }
    }
}

/// Options accepted per client and per request.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Default headers merged into requests that lack them.
    pub headers: Option<HeaderMap>,
    /// Transport timeout forwarded to the adapter.
    pub timeout: Option<Duration>,
    /// TLS verification forwarded to the adapter.
    pub ssl_verify: Option<bool>,
    /// Proxy selection forwarded to the adapter.
    pub proxy: Option<Proxy>,
    /// Retry attempt budget, including the first attempt.
    pub max_retries: Option<u32>,
    /// Whether reset connections may be retried.
    pub retry_safe: Option<bool>,
    /// First-retry delay.
    pub base_delay: Option<Duration>,
    /// Backoff cap.
    pub max_delay: Option<Duration>,
    /// Jitter factor in `[0, 1]`.
    pub jitter_factor: Option<f64>,
    /// Rate limiter component switch.
    pub rate_limit: Toggle<RateLimitOptions>,
    /// Custom bucket key; defaults to the URL host.
    pub rate_limit_key: Option<String>,
    /// Circuit breaker component switch.
    pub circuit_breaker: Toggle<CircuitBreakerOptions>,
    /// Custom circuit key; defaults to the URL host.
    pub circuit_breaker_key: Option<String>,
    /// Deduplication component switch.
    pub deduplicate: Toggle<DedupOptions>,
    /// Block all outbound requests with `network_blocked`.
    pub test_mode: bool,
}

impl ClientOptions {
    /// Creates empty options; everything falls through to defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a predefined profile underneath the fields already set.
    pub fn profile(self, profile: Profile) -> Self {
        self.deep_over(profile.options())
    }

    /// Sets default headers merged into requests that lack them.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Sets the transport timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets TLS verification.
    pub fn ssl_verify(mut self, verify: bool) -> Self {
        self.ssl_verify = Some(verify);
        self
    }

    /// Sets the proxy selection.
    pub fn proxy(mut self, proxy: Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Sets the retry attempt budget (including the first attempt).
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Allows retrying reset connections.
    pub fn retry_safe(mut self, retry_safe: bool) -> Self {
        self.retry_safe = Some(retry_safe);
        self
    }

    /// Sets the first-retry delay.
    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = Some(base_delay);
        self
    }

    /// Sets the backoff cap.
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Sets the jitter factor.
    pub fn jitter_factor(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = Some(jitter_factor);
        self
    }

    /// Enables rate limiting with the given options.
    pub fn rate_limit(mut self, options: RateLimitOptions) -> Self {
        self.rate_limit = Toggle::Enabled(options);
        self
    }

    /// The boolean shorthand: enable with defaults, or disable.
    pub fn rate_limit_enabled(mut self, enabled: bool) -> Self {
        self.rate_limit = if enabled {
            Toggle::Enabled(RateLimitOptions::default())
        } else {
            Toggle::Disabled
        };
        self
    }

    /// Sets a custom bucket key.
    pub fn rate_limit_key<S: Into<String>>(mut self, key: S) -> Self {
        self.rate_limit_key = Some(key.into());
        self
    }

    /// Enables circuit breaking with the given options.
    pub fn circuit_breaker(mut self, options: CircuitBreakerOptions) -> Self {
        self.circuit_breaker = Toggle::Enabled(options);
        self
    }

    /// The boolean shorthand: enable with defaults, or disable.
    pub fn circuit_breaker_enabled(mut self, enabled: bool) -> Self {
        self.circuit_breaker = if enabled {
            Toggle::Enabled(CircuitBreakerOptions::default())
        } else {
            Toggle::Disabled
        };
        self
    }

    /// Sets a custom circuit key.
    pub fn circuit_breaker_key<S: Into<String>>(mut self, key: S) -> Self {
        self.circuit_breaker_key = Some(key.into());
        self
    }

    /// Enables deduplication with the given options.
    pub fn deduplicate(mut self, options: DedupOptions) -> Self {
        self.deduplicate = Toggle::Enabled(options);
        self
    }

    /// The boolean shorthand: enable with defaults, or disable.
    pub fn deduplicate_enabled(mut self, enabled: bool) -> Self {
        self.deduplicate = if enabled {
            Toggle::Enabled(DedupOptions::default())
        } else {
            Toggle::Disabled
        };
        self
    }

    /// Blocks all outbound requests with `network_blocked`.
    pub fn test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    /// Per-request over per-client: `self`'s set fields win, component
    /// switches are replaced wholesale.
    pub(crate) fn shallow_over(self, base: &Self) -> Self {
        Self {
            headers: self.headers.or_else(|| base.headers.clone()),
            timeout: self.timeout.or(base.timeout),
            ssl_verify: self.ssl_verify.or(base.ssl_verify),
            proxy: self.proxy.or_else(|| base.proxy.clone()),
            max_retries: self.max_retries.or(base.max_retries),
            retry_safe: self.retry_safe.or(base.retry_safe),
            base_delay: self.base_delay.or(base.base_delay),
            max_delay: self.max_delay.or(base.max_delay),
            jitter_factor: self.jitter_factor.or(base.jitter_factor),
            rate_limit: self.rate_limit.shallow_over(base.rate_limit.clone()),
            rate_limit_key: self.rate_limit_key.or_else(|| base.rate_limit_key.clone()),
            circuit_breaker: self
                .circuit_breaker
                .shallow_over(base.circuit_breaker.clone()),
            circuit_breaker_key: self
                .circuit_breaker_key
                .or_else(|| base.circuit_breaker_key.clone()),
            deduplicate: self.deduplicate.shallow_over(base.deduplicate.clone()),
            test_mode: self.test_mode || base.test_mode,
        }
    }

    /// Explicit over profile: like [`shallow_over`](Self::shallow_over)
    /// but component bundles merge field by field.
    fn deep_over(mut self, base: Self) -> Self {
        let rate_limit =
            std::mem::take(&mut self.rate_limit).deep_over(base.rate_limit.clone());
        let circuit_breaker =
            std::mem::take(&mut self.circuit_breaker).deep_over(base.circuit_breaker.clone());
        let deduplicate =
            std::mem::take(&mut self.deduplicate).deep_over(base.deduplicate.clone());

        let mut merged = self.shallow_over(&base);
        merged.rate_limit = rate_limit;
        merged.circuit_breaker = circuit_breaker;
        merged.deduplicate = deduplicate;
        merged
    }

    /// The transport settings forwarded to the adapter.
    pub(crate) fn adapter_options(&self) -> AdapterOptions {
        let defaults = AdapterOptions::default();
        AdapterOptions {
            timeout: self.timeout.unwrap_or(defaults.timeout),
            ssl_verify: self.ssl_verify.unwrap_or(defaults.ssl_verify),
            proxy: self.proxy.clone().unwrap_or(defaults.proxy),
        }
    }
}

/// Predefined option bundles for common deployment shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Conservative settings for money movement: no unsafe retries, a
    /// strict breaker, and deduplication of identical submissions.
    PaymentProcessing,
    /// Throughput-oriented settings: a generous waiting rate limit that
    /// adapts to circuit state.
    HighVolumeApi,
    /// Service-mesh settings: fail fast, recover fast.
    MicroservicesMesh,
}

impl Profile {
    /// Looks a profile up by its configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "payment_processing" => Some(Profile::PaymentProcessing),
            "high_volume_api" => Some(Profile::HighVolumeApi),
            "microservices_mesh" => Some(Profile::MicroservicesMesh),
            _ => None,
        }
    }

    /// The profile's option bundle.
    pub fn options(self) -> ClientOptions {
        match self {
            Profile::PaymentProcessing => ClientOptions::new()
                .max_retries(2)
                .retry_safe(false)
                .timeout(Duration::from_secs(30))
                .circuit_breaker(
                    CircuitBreakerOptions::new()
                        .failure_threshold(3)
                        .window_size(10)
                        .timeout(Duration::from_secs(30)),
                )
                .deduplicate(DedupOptions::new())
                .rate_limit(
                    RateLimitOptions::new()
                        .requests(10)
                        .per(Per::Second)
                        .strategy(Strategy::Error),
                ),
            Profile::HighVolumeApi => ClientOptions::new()
                .max_retries(3)
                .rate_limit(
                    RateLimitOptions::new()
                        .requests(100)
                        .per(Per::Second)
                        .strategy(Strategy::Wait)
                        .max_wait_time(Duration::from_secs(10))
                        .adaptive(true),
                )
                .circuit_breaker(CircuitBreakerOptions::new())
                .deduplicate(DedupOptions::new()),
            Profile::MicroservicesMesh => ClientOptions::new()
                .max_retries(2)
                .base_delay(Duration::from_millis(100))
                .max_delay(Duration::from_secs(2))
                .timeout(Duration::from_secs(5))
                .circuit_breaker(
                    CircuitBreakerOptions::new()
                        .failure_threshold(5)
                        .window_size(20)
                        .timeout(Duration::from_secs(5))
                        .half_open_requests(3),
                )
                .deduplicate(DedupOptions::new().ttl(Duration::from_millis(100))),
        }
    }
}
