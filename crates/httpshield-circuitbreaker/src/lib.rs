//! Per-key circuit breaking for the httpshield request engine.
//!
//! Each destination key gets its own three-state circuit:
//!
//! - **Closed**: normal operation, outcomes feed a sliding window
//! - **Open**: requests are rejected immediately with `service_unavailable`
//! - **HalfOpen**: after `timeout`, a bounded probe budget tests recovery
//!
//! The open decision uses an absolute failure count, or a failure
//! percentage once the window is full. Half-open admission is race-free:
//! the probe counter is checked and incremented inside the same per-key
//! critical section, so N concurrent requests against a half-open circuit
//! with budget K admit exactly K.
//!
//! ## Example
//!
//! ```rust
//! use httpshield_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let registry = CircuitBreakerRegistry::new();
//! let config = CircuitBreakerConfig::builder()
//!     .failure_threshold(3)
//!     .window_size(10)
//!     .timeout(Duration::from_millis(100))
//!     .name("payments")
//!     .build();
//!
//! let result = registry
//!     .call("api.example.com", &config, async { Ok::<_, httpshield_core::Error>(42) })
//!     .await;
//! assert_eq!(result.unwrap(), 42);
//! assert_eq!(registry.state("api.example.com"), Some(CircuitState::Closed));
//! # }
//! ```

mod circuit;
mod config;
mod events;

pub use circuit::CircuitState;
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use events::CircuitBreakerEvent;

use circuit::Circuit;
use hashbrown::HashMap;
use httpshield_core::Error;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// One circuit plus its lock-free state mirror.
struct CircuitCell {
    snapshot: Arc<AtomicU8>,
    inner: Mutex<Circuit>,
}

impl CircuitCell {
    fn new() -> Self {
        let snapshot = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Self {
            inner: Mutex::new(Circuit::new(Arc::clone(&snapshot))),
            snapshot,
        }
    }
}

/// A concurrent store of per-key circuits.
///
/// Circuits are created lazily on first reference and live until an
/// explicit [`reset`](Self::reset). The store is reinitialized with the
/// process; no state survives a restart.
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    circuits: Mutex<HashMap<String, Arc<CircuitCell>>>,
}

impl CircuitBreakerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate, execute, record: runs `fut` if the circuit admits the call,
    /// recording the outcome; otherwise returns `service_unavailable`
    /// without executing it.
    pub async fn call<T, F>(
        &self,
        key: &str,
        config: &CircuitBreakerConfig,
        fut: F,
    ) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        if !self.try_acquire(key, config) {
            return Err(Error::ServiceUnavailable);
        }

        let result = fut.await;
        match &result {
            Ok(_) => self.record_success(key, config),
            Err(_) => self.record_failure(key, config),
        }
        result
    }

    /// Asks the gate whether a call may proceed. In half-open this also
    /// claims one probe slot.
    pub fn try_acquire(&self, key: &str, config: &CircuitBreakerConfig) -> bool {
        let cell = self.cell(key);
        let mut circuit = cell.inner.lock();
        circuit.try_acquire(config, key)
    }

    /// Records a successful outcome against the key's circuit.
    pub fn record_success(&self, key: &str, config: &CircuitBreakerConfig) {
        let cell = self.cell(key);
        let mut circuit = cell.inner.lock();
        circuit.record_success(config, key);
    }

    /// Records a failed outcome against the key's circuit.
    pub fn record_failure(&self, key: &str, config: &CircuitBreakerConfig) {
        let cell = self.cell(key);
        let mut circuit = cell.inner.lock();
        circuit.record_failure(config, key);
    }

    /// Snapshot of the circuit's state without taking its lock.
    ///
    /// Returns `None` when no circuit exists for the key yet. The snapshot
    /// may trail a concurrent transition by a moment, which is fine for
    /// its advisory consumers.
    pub fn state(&self, key: &str) -> Option<CircuitState> {
        self.circuits
            .lock()
            .get(key)
            .map(|cell| CircuitState::from_u8(cell.snapshot.load(Ordering::Acquire)))
    }

    /// Forces the circuit open.
    pub fn force_open(&self, key: &str, config: &CircuitBreakerConfig) {
        let cell = self.cell(key);
        let mut circuit = cell.inner.lock();
        circuit.force_open(config, key);
    }

    /// Forces the circuit closed, clearing its window.
    pub fn force_closed(&self, key: &str, config: &CircuitBreakerConfig) {
        let cell = self.cell(key);
        let mut circuit = cell.inner.lock();
        circuit.force_closed(config, key);
    }

    /// Removes the circuit entirely; the next reference starts from a
    /// fresh closed circuit.
    pub fn reset(&self, key: &str) {
        self.circuits.lock().remove(key);
    }

    /// Number of live circuits.
    pub fn len(&self) -> usize {
        self.circuits.lock().len()
    }

    /// Returns true when no circuits exist.
    pub fn is_empty(&self) -> bool {
        self.circuits.lock().is_empty()
    }

    fn cell(&self, key: &str) -> Arc<CircuitCell> {
        let mut circuits = self.circuits.lock();
        Arc::clone(
            circuits
                .entry_ref(key)
                .or_insert_with(|| Arc::new(CircuitCell::new())),
        )
    }
}
