use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Represents the state of one circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// Calls are allowed.
    Closed = 0,
    /// Calls are rejected immediately.
    Open = 1,
    /// A bounded number of probe calls are allowed.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Stable label used in events and telemetry.
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
}

/// The state machine for one key.
///
/// Always accessed under the registry's per-key mutex; the atomic mirror
/// exists so advisory readers (the adaptive rate limiter) can snapshot the
/// state without contending on that mutex.
pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    window: VecDeque<(Outcome, Instant)>,
    failure_count: usize,
    opened_at: Option<Instant>,
    half_open_admitted: u32,
    half_open_successes: u32,
}

impl Circuit {
    pub(crate) fn new(state_atomic: Arc<AtomicU8>) -> Self {
        Self {
            state: CircuitState::Closed,
            state_atomic,
            window: VecDeque::new(),
            failure_count: 0,
            opened_at: None,
            half_open_admitted: 0,
            half_open_successes: 0,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn failures_in_window(&self) -> usize {
        self.failure_count
    }

    /// Gate: decides whether a call may proceed, updating admission
    /// counters in the same critical section as the check.
    pub(crate) fn try_acquire(&mut self, config: &CircuitBreakerConfig, key: &str) -> bool {
        match self.state {
            CircuitState::Closed => {
                self.emit_admitted(config, key);
                true
            }
            CircuitState::Open => {
                let expired = self
                    .opened_at
                    .map(|at| at.elapsed() >= config.timeout)
                    .unwrap_or(true);
                if expired {
                    self.transition_to(CircuitState::HalfOpen, config, key);
                    // The transition request itself is the first probe.
                    self.half_open_admitted = 1;
                    self.emit_admitted(config, key);
                    true
                } else {
                    self.emit_rejected(config, key);
                    false
                }
            }
            CircuitState::HalfOpen => {
                if self.half_open_admitted < config.half_open_requests {
                    self.half_open_admitted += 1;
                    self.emit_admitted(config, key);
                    true
                } else {
                    self.emit_rejected(config, key);
                    false
                }
            }
        }
    }

    pub(crate) fn record_success(&mut self, config: &CircuitBreakerConfig, key: &str) {
        self.push_outcome(Outcome::Success, config);

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::SuccessRecorded {
                key: key.to_string(),
                timestamp: Instant::now(),
                state: self.state,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "key" => key.to_string(), "outcome" => "success")
            .increment(1);

        if self.state == CircuitState::HalfOpen {
            self.half_open_successes += 1;
            if self.half_open_successes >= config.half_open_requests {
                self.transition_to(CircuitState::Closed, config, key);
            }
        }
    }

    pub(crate) fn record_failure(&mut self, config: &CircuitBreakerConfig, key: &str) {
        self.push_outcome(Outcome::Failure, config);

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::FailureRecorded {
                key: key.to_string(),
                timestamp: Instant::now(),
                state: self.state,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "key" => key.to_string(), "outcome" => "failure")
            .increment(1);

        match self.state {
            CircuitState::HalfOpen => self.transition_to(CircuitState::Open, config, key),
            CircuitState::Closed => {
                if self.should_open(config) {
                    self.transition_to(CircuitState::Open, config, key);
                }
            }
            CircuitState::Open => {}
        }
    }

    pub(crate) fn force_open(&mut self, config: &CircuitBreakerConfig, key: &str) {
        self.transition_to(CircuitState::Open, config, key);
    }

    pub(crate) fn force_closed(&mut self, config: &CircuitBreakerConfig, key: &str) {
        self.transition_to(CircuitState::Closed, config, key);
    }

    /// Absolute-count threshold, or percentage threshold once the window is
    /// full. Evaluating the percentage on a partial window would open the
    /// circuit off a single early failure.
    fn should_open(&self, config: &CircuitBreakerConfig) -> bool {
        if self.failure_count >= config.failure_threshold as usize {
            return true;
        }
        self.window.len() >= config.window_size
            && self.failure_count * 100
                >= usize::from(config.failure_threshold_percentage) * self.window.len()
    }

    fn push_outcome(&mut self, outcome: Outcome, config: &CircuitBreakerConfig) {
        while self.window.len() >= config.window_size.max(1) {
            if let Some((Outcome::Failure, _)) = self.window.pop_front() {
                self.failure_count -= 1;
            }
        }
        if outcome == Outcome::Failure {
            self.failure_count += 1;
        }
        self.window.push_back((outcome, Instant::now()));
    }

    fn transition_to(&mut self, state: CircuitState, config: &CircuitBreakerConfig, key: &str) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateChange {
                key: key.to_string(),
                timestamp: Instant::now(),
                from: from_state,
                to: state,
                failure_count: self.failure_count,
            });

        #[cfg(feature = "tracing")]
        tracing::info!(
            key,
            from = from_state.as_str(),
            to = state.as_str(),
            failures = self.failure_count,
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "key" => key.to_string(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);
            gauge!("circuitbreaker_state", "key" => key.to_string()).set(state as u8 as f64);
        }

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.opened_at = match state {
            CircuitState::Open => Some(Instant::now()),
            _ => None,
        };
        self.window.clear();
        self.failure_count = 0;
        self.half_open_admitted = 0;
        self.half_open_successes = 0;
    }

    fn emit_admitted(&self, config: &CircuitBreakerConfig, key: &str) {
        config.event_listeners.emit(&CircuitBreakerEvent::Admitted {
            key: key.to_string(),
            timestamp: Instant::now(),
            state: self.state,
        });
    }

    fn emit_rejected(&self, config: &CircuitBreakerConfig, key: &str) {
        config.event_listeners.emit(&CircuitBreakerEvent::Rejected {
            key: key.to_string(),
            timestamp: Instant::now(),
        });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "key" => key.to_string(), "outcome" => "rejected")
            .increment(1);
    }
}
