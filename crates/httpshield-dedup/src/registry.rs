//! The fingerprint registry.

use crate::config::DedupConfig;
use crate::events::DedupEvent;
use hashbrown::HashMap;
use httpshield_core::{Error, Response};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

#[cfg(feature = "metrics")]
use metrics::counter;

enum Entry {
    InFlight {
        tx: broadcast::Sender<Response>,
        epoch: u64,
    },
    Completed {
        response: Response,
        completed_at: Instant,
    },
}

/// What a request should do after consulting the registry.
pub enum Begin {
    /// This request is the leader; execute it and settle the token.
    Execute(ExecutionToken),
    /// An identical request is in flight; wait for its response.
    Wait(Waiter),
    /// An identical request completed moments ago; reuse its response.
    Cached(Response),
}

/// The leader's handle on its in-flight entry.
///
/// Settled with [`complete`](Self::complete) on success or
/// [`cancel`](Self::cancel) on failure. If the leader's task is dropped
/// without settling (caller cancellation), the drop guard removes the entry
/// so waiters fail fast instead of parking out their full timeout.
///
/// The token is bound to the entry that created it: if the entry was
/// cancelled and re-created by a newer request, a stale token settles
/// nothing.
#[must_use = "an unsettled token cancels its entry on drop"]
pub struct ExecutionToken {
    registry: Arc<DedupRegistry>,
    key: String,
    epoch: u64,
    settled: bool,
}

impl ExecutionToken {
    /// The dedup key this token guards.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Publishes the response to all waiters and caches it for late
    /// duplicates.
    pub fn complete(mut self, config: &DedupConfig, response: &Response) {
        self.settled = true;
        self.registry
            .settle_complete(&self.key, Some(self.epoch), response, Some(config));
    }

    /// Drops the in-flight entry; waiters observe the closed channel and
    /// surface `dedup_timeout`.
    pub fn cancel(mut self, config: &DedupConfig) {
        self.settled = true;
        self.registry
            .settle_cancel(&self.key, Some(self.epoch), Some(config));
    }
}

impl Drop for ExecutionToken {
    fn drop(&mut self) {
        if !self.settled {
            self.registry.settle_cancel(&self.key, Some(self.epoch), None);
        }
    }
}

/// A duplicate request's subscription to the leader's response.
pub struct Waiter {
    rx: broadcast::Receiver<Response>,
    timeout: Duration,
}

impl Waiter {
    /// Parks until the leader publishes, the leader disappears, or the
    /// wait timeout elapses. The latter two surface `dedup_timeout`.
    pub async fn wait(mut self) -> Result<Response, Error> {
        match tokio::time::timeout(self.timeout, self.rx.recv()).await {
            Ok(Ok(response)) => Ok(response),
            // Closed: the leader was cancelled. Lagged cannot happen with a
            // single send, but map it the same way rather than panic.
            Ok(Err(_)) => Err(Error::DedupTimeout),
            Err(_) => Err(Error::DedupTimeout),
        }
    }
}

/// A concurrent store of in-flight and recently completed requests.
#[derive(Default)]
pub struct DedupRegistry {
    entries: Mutex<HashMap<String, Entry>>,
    epoch: AtomicU64,
}

impl DedupRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the key and decides this request's role.
    ///
    /// Exactly one concurrent caller per key receives [`Begin::Execute`];
    /// the rest become waiters or cache hits.
    pub fn check(self: &Arc<Self>, key: &str, config: &DedupConfig) -> Begin {
        let begin = {
            let mut entries = self.entries.lock();
            match entries.get(key) {
                Some(Entry::InFlight { tx, .. }) => Begin::Wait(Waiter {
                    rx: tx.subscribe(),
                    timeout: config.wait_timeout,
                }),
                Some(Entry::Completed {
                    response,
                    completed_at,
                }) if completed_at.elapsed() < config.completed_ttl => {
                    Begin::Cached(response.clone())
                }
                _ => {
                    // Absent, or a completed entry past its TTL that the
                    // janitor has not collected yet.
                    let (tx, _rx) = broadcast::channel(1);
                    let epoch = self.epoch.fetch_add(1, Ordering::Relaxed);
                    entries.insert(key.to_string(), Entry::InFlight { tx, epoch });
                    Begin::Execute(ExecutionToken {
                        registry: Arc::clone(self),
                        key: key.to_string(),
                        epoch,
                        settled: false,
                    })
                }
            }
        };

        match &begin {
            Begin::Execute(_) => {
                config.event_listeners.emit(&DedupEvent::Execute {
                    key: key.to_string(),
                    timestamp: Instant::now(),
                });

                #[cfg(feature = "metrics")]
                counter!("dedup_requests_total", "dedup" => config.name.clone(), "role" => "leader")
                    .increment(1);
            }
            Begin::Wait(_) => {
                config.event_listeners.emit(&DedupEvent::Wait {
                    key: key.to_string(),
                    timestamp: Instant::now(),
                });

                #[cfg(feature = "metrics")]
                counter!("dedup_requests_total", "dedup" => config.name.clone(), "role" => "waiter")
                    .increment(1);

                #[cfg(feature = "tracing")]
                tracing::debug!(key, bypassed_rate_limit = 1, "request coalesced as waiter");
            }
            Begin::Cached(_) => {
                config.event_listeners.emit(&DedupEvent::CacheHit {
                    key: key.to_string(),
                    timestamp: Instant::now(),
                });

                #[cfg(feature = "metrics")]
                counter!("dedup_requests_total", "dedup" => config.name.clone(), "role" => "cache_hit")
                    .increment(1);

                #[cfg(feature = "tracing")]
                tracing::debug!(key, bypassed_rate_limit = 1, "request served from completed cache");
            }
        }

        begin
    }

    /// Publishes a response for the key's in-flight entry, regardless of
    /// which token created it.
    pub fn complete(&self, key: &str, response: &Response, config: &DedupConfig) {
        self.settle_complete(key, None, response, Some(config));
    }

    /// Removes the key's in-flight entry without publishing; existing
    /// waiters observe the closed channel.
    pub fn cancel(&self, key: &str, config: &DedupConfig) {
        self.settle_cancel(key, None, Some(config));
    }

    /// Evicts completed entries older than `ttl`. In-flight entries are
    /// only ever removed by `complete`/`cancel`.
    pub fn purge_completed(&self, ttl: Duration) {
        let now = Instant::now();
        self.entries.lock().retain(|_, entry| match entry {
            Entry::InFlight { .. } => true,
            Entry::Completed { completed_at, .. } => now.duration_since(*completed_at) < ttl,
        });
    }

    /// Spawns the background janitor. Best-effort: the handle may simply
    /// be aborted at shutdown.
    pub fn spawn_janitor(
        self: &Arc<Self>,
        interval: Duration,
        ttl: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                registry.purge_completed(ttl);
            }
        })
    }

    /// Number of live entries (in-flight and completed).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true when no entries exist.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn settle_complete(
        &self,
        key: &str,
        epoch_filter: Option<u64>,
        response: &Response,
        config: Option<&DedupConfig>,
    ) {
        let waiters = {
            let mut entries = self.entries.lock();
            match entries.get(key) {
                Some(Entry::InFlight { tx, epoch })
                    if epoch_filter.map_or(true, |e| e == *epoch) =>
                {
                    let waiters = tx.receiver_count();
                    let _ = tx.send(response.clone());
                    entries.insert(
                        key.to_string(),
                        Entry::Completed {
                            response: response.clone(),
                            completed_at: Instant::now(),
                        },
                    );
                    Some(waiters)
                }
                _ => None,
            }
        };

        if let (Some(waiters), Some(config)) = (waiters, config) {
            config.event_listeners.emit(&DedupEvent::Completed {
                key: key.to_string(),
                timestamp: Instant::now(),
                waiters,
            });
        }
    }

    fn settle_cancel(&self, key: &str, epoch_filter: Option<u64>, config: Option<&DedupConfig>) {
        let removed = {
            let mut entries = self.entries.lock();
            match entries.get(key) {
                Some(Entry::InFlight { epoch, .. })
                    if epoch_filter.map_or(true, |e| e == *epoch) =>
                {
                    entries.remove(key);
                    true
                }
                _ => false,
            }
        };

        if removed {
            if let Some(config) = config {
                config.event_listeners.emit(&DedupEvent::Cancelled {
                    key: key.to_string(),
                    timestamp: Instant::now(),
                });
            }
        }
    }
}
