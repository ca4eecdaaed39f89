use crate::events::RetryEvent;
use httpshield_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for the retry executor.
pub struct RetryPolicy {
    pub(crate) max_retries: u32,
    pub(crate) retry_safe: bool,
    pub(crate) base_delay: Duration,
    pub(crate) max_delay: Duration,
    pub(crate) jitter_factor: f64,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) name: String,
}

impl RetryPolicy {
    /// Returns a new builder with defaults.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// The attempt budget, including the initial attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether reset connections may be retried.
    pub fn retry_safe(&self) -> bool {
        self.retry_safe
    }
}

/// Builder for [`RetryPolicy`].
pub struct RetryPolicyBuilder {
    max_retries: u32,
    retry_safe: bool,
    base_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicyBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - max_retries: 3 (the attempt budget, including the first attempt)
    /// - retry_safe: false
    /// - base_delay: 1 second, max_delay: 30 seconds
    /// - jitter_factor: 0.2
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            retry_safe: false,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            jitter_factor: 0.2,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets the attempt budget, including the initial attempt.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Allows retrying `econnreset` failures.
    ///
    /// Off by default: a reset connection may mean the server already
    /// processed a non-idempotent request.
    pub fn retry_safe(mut self, retry_safe: bool) -> Self {
        self.retry_safe = retry_safe;
        self
    }

    /// Sets the first-retry delay; subsequent delays double.
    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Caps the computed backoff delay.
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Sets the jitter factor in `[0, 1]`; delays are shortened by up to
    /// this fraction.
    pub fn jitter_factor(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Sets the name used in events for this policy.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback fired before each retry sleep, with the
    /// upcoming attempt number and its delay.
    pub fn on_attempt<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Attempt { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback fired when the attempt budget runs out.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Exhausted { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Adds a raw event listener.
    pub fn on_event<L>(mut self, listener: L) -> Self
    where
        L: httpshield_core::events::EventListener<RetryEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Appends an existing listener collection.
    pub fn listeners(mut self, listeners: &EventListeners<RetryEvent>) -> Self {
        self.event_listeners.extend_from(listeners);
        self
    }

    /// Builds the policy.
    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_safe: self.retry_safe,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            jitter_factor: self.jitter_factor,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}
