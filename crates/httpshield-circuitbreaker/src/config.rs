use crate::circuit::CircuitState;
use crate::events::CircuitBreakerEvent;
use httpshield_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for one circuit breaker policy.
pub struct CircuitBreakerConfig {
    pub(crate) failure_threshold: u32,
    pub(crate) failure_threshold_percentage: u8,
    pub(crate) window_size: usize,
    pub(crate) timeout: Duration,
    pub(crate) half_open_requests: u32,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

impl CircuitBreakerConfig {
    /// Returns a new builder with defaults.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }
}

/// Builder for [`CircuitBreakerConfig`].
pub struct CircuitBreakerConfigBuilder {
    failure_threshold: u32,
    failure_threshold_percentage: u8,
    window_size: usize,
    timeout: Duration,
    half_open_requests: u32,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - failure_threshold: 5
    /// - failure_threshold_percentage: 50 (evaluated once the window is full)
    /// - window_size: 10
    /// - timeout: 60 seconds in open before probing
    /// - half_open_requests: 1
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            failure_threshold: 5,
            failure_threshold_percentage: 50,
            window_size: 10,
            timeout: Duration::from_secs(60),
            half_open_requests: 1,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Absolute failure count within the window that opens the circuit.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Failure percentage that opens the circuit once the window is full.
    pub fn failure_threshold_percentage(mut self, percentage: u8) -> Self {
        self.failure_threshold_percentage = percentage;
        self
    }

    /// Number of recent outcomes considered for the open decision.
    pub fn window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    /// How long an open circuit rejects before admitting probes.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Probe budget in the half-open state; this many consecutive
    /// successes close the circuit again.
    pub fn half_open_requests(mut self, requests: u32) -> Self {
        self.half_open_requests = requests;
        self
    }

    /// Sets the name used in events for this policy.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback for every state transition.
    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::StateChange { from, to, .. } = event {
                f(*from, *to);
            }
        }));
        self
    }

    /// Registers a callback for calls rejected by an open circuit.
    pub fn on_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::Rejected { .. } = event {
                f();
            }
        }));
        self
    }

    /// Adds a raw event listener.
    pub fn on_event<L>(mut self, listener: L) -> Self
    where
        L: httpshield_core::events::EventListener<CircuitBreakerEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Appends an existing listener collection.
    pub fn listeners(mut self, listeners: &EventListeners<CircuitBreakerEvent>) -> Self {
        self.event_listeners.extend_from(listeners);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            failure_threshold_percentage: self.failure_threshold_percentage,
            window_size: self.window_size,
            timeout: self.timeout,
            half_open_requests: self.half_open_requests,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}
