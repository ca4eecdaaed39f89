use crate::events::DedupEvent;
use httpshield_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for one deduplication policy.
pub struct DedupConfig {
    pub(crate) completed_ttl: Duration,
    pub(crate) wait_timeout: Duration,
    pub(crate) key: Option<String>,
    pub(crate) event_listeners: EventListeners<DedupEvent>,
    pub(crate) name: String,
}

impl DedupConfig {
    /// Returns a new builder with defaults.
    pub fn builder() -> DedupConfigBuilder {
        DedupConfigBuilder::new()
    }

    /// The explicit key override, if configured.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// How long completed responses stay reusable.
    pub fn completed_ttl(&self) -> Duration {
        self.completed_ttl
    }
}

/// Builder for [`DedupConfig`].
pub struct DedupConfigBuilder {
    completed_ttl: Duration,
    wait_timeout: Duration,
    key: Option<String>,
    event_listeners: EventListeners<DedupEvent>,
    name: String,
}

impl Default for DedupConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - completed_ttl: 500 ms
    /// - wait_timeout: 30 seconds
    /// - key: derived from the request fingerprint
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            completed_ttl: Duration::from_millis(500),
            wait_timeout: Duration::from_secs(30),
            key: None,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// How long a completed response may be reused by late duplicates.
    pub fn completed_ttl(mut self, ttl: Duration) -> Self {
        self.completed_ttl = ttl;
        self
    }

    /// How long a duplicate waits for the leader before giving up with
    /// `dedup_timeout`.
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Overrides the fingerprint with an explicit dedup key.
    pub fn key<S: Into<String>>(mut self, key: S) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the name used in events for this policy.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback for cache hits on recently completed requests.
    pub fn on_cache_hit<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let DedupEvent::CacheHit { key, .. } = event {
                f(key);
            }
        }));
        self
    }

    /// Registers a callback invoked when a duplicate starts waiting on the
    /// leader.
    pub fn on_wait<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let DedupEvent::Wait { key, .. } = event {
                f(key);
            }
        }));
        self
    }

    /// Registers a callback invoked when a request becomes the leader.
    pub fn on_execute<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let DedupEvent::Execute { key, .. } = event {
                f(key);
            }
        }));
        self
    }

    /// Adds a raw event listener.
    pub fn on_event<L>(mut self, listener: L) -> Self
    where
        L: httpshield_core::events::EventListener<DedupEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Appends an existing listener collection.
    pub fn listeners(mut self, listeners: &EventListeners<DedupEvent>) -> Self {
        self.event_listeners.extend_from(listeners);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> DedupConfig {
        DedupConfig {
            completed_ttl: self.completed_ttl,
            wait_timeout: self.wait_timeout,
            key: self.key,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}
