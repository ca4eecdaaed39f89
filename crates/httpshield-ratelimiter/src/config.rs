use crate::events::RateLimiterEvent;
use httpshield_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// The window a request quota applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Per {
    /// `requests` per second.
    #[default]
    Second,
    /// `requests` per minute.
    Minute,
    /// `requests` per hour.
    Hour,
}

impl Per {
    /// Window length in milliseconds.
    pub fn window_ms(self) -> u64 {
        match self {
            Per::Second => 1_000,
            Per::Minute => 60 * 1_000,
            Per::Hour => 60 * 60 * 1_000,
        }
    }
}

/// What to do when no token is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Sleep until a token refills, up to `max_wait_time`.
    #[default]
    Wait,
    /// Reject immediately with `too_many_requests`.
    Error,
}

impl Strategy {
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Strategy::Wait => "wait",
            Strategy::Error => "error",
        }
    }
}

/// Configuration for one rate-limit policy.
pub struct RateLimiterConfig {
    pub(crate) enabled: bool,
    pub(crate) requests: u32,
    pub(crate) per: Per,
    pub(crate) strategy: Strategy,
    pub(crate) max_wait_time: Duration,
    pub(crate) adaptive: bool,
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
    pub(crate) name: String,
}

impl RateLimiterConfig {
    /// Returns a new builder with defaults.
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }

    /// The bucket capacity.
    pub fn max_tokens(&self) -> f64 {
        f64::from(self.requests)
    }

    /// Tokens regenerated per millisecond.
    pub fn refill_rate_per_ms(&self) -> f64 {
        f64::from(self.requests) / self.per.window_ms() as f64
    }

    /// The configured quota.
    pub fn requests(&self) -> u32 {
        self.requests
    }

    /// Whether this policy is active.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether circuit-breaker-driven capacity scaling is active.
    pub fn is_adaptive(&self) -> bool {
        self.adaptive
    }
}

/// Builder for [`RateLimiterConfig`].
pub struct RateLimiterConfigBuilder {
    enabled: bool,
    requests: u32,
    per: Per,
    strategy: Strategy,
    max_wait_time: Duration,
    adaptive: bool,
    event_listeners: EventListeners<RateLimiterEvent>,
    name: String,
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - requests: 50 per second
    /// - strategy: `Wait` with a 5 second cap
    /// - adaptive: off
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            enabled: true,
            requests: 50,
            per: Per::Second,
            strategy: Strategy::Wait,
            max_wait_time: Duration::from_secs(5),
            adaptive: false,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Enables or disables the policy. Disabled policies never touch a
    /// bucket and always allow.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the request quota per window.
    ///
    /// A quota of zero never allows a request.
    pub fn requests(mut self, requests: u32) -> Self {
        self.requests = requests;
        self
    }

    /// Sets the quota window.
    pub fn per(mut self, per: Per) -> Self {
        self.per = per;
        self
    }

    /// Sets the behavior when the bucket is empty.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the longest a `Wait`-strategy consume will sleep before giving
    /// up with `rate_limit_wait_timeout`.
    pub fn max_wait_time(mut self, max_wait_time: Duration) -> Self {
        self.max_wait_time = max_wait_time;
        self
    }

    /// Enables advisory capacity scaling from circuit breaker state.
    pub fn adaptive(mut self, adaptive: bool) -> Self {
        self.adaptive = adaptive;
        self
    }

    /// Sets the name used in events for this policy.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback for every successful consume, with the tokens
    /// remaining afterwards.
    pub fn on_consumed<F>(mut self, f: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::Consumed { remaining, .. } = event {
                f(*remaining);
            }
        }));
        self
    }

    /// Registers a callback invoked before a `Wait`-strategy sleep, with
    /// the computed wait.
    pub fn on_wait<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::Waiting { wait, .. } = event {
                f(*wait);
            }
        }));
        self
    }

    /// Registers a callback for rejections (either strategy).
    pub fn on_exceeded<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::Exceeded { .. } = event {
                f();
            }
        }));
        self
    }

    /// Registers a callback for adaptive capacity reductions, with the
    /// original and adjusted rates.
    pub fn on_adaptive_reduction<F>(mut self, f: F) -> Self
    where
        F: Fn(f64, f64) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::AdaptiveReduction {
                original_rate,
                adjusted_rate,
                ..
            } = event
            {
                f(*original_rate, *adjusted_rate);
            }
        }));
        self
    }

    /// Adds a raw event listener.
    pub fn on_event<L>(mut self, listener: L) -> Self
    where
        L: httpshield_core::events::EventListener<RateLimiterEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Appends an existing listener collection.
    pub fn listeners(mut self, listeners: &EventListeners<RateLimiterEvent>) -> Self {
        self.event_listeners.extend_from(listeners);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> RateLimiterConfig {
        RateLimiterConfig {
            enabled: self.enabled,
            requests: self.requests,
            per: self.per,
            strategy: self.strategy,
            max_wait_time: self.max_wait_time,
            adaptive: self.adaptive,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}
