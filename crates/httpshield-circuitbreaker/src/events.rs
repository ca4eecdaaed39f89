use crate::circuit::CircuitState;
use httpshield_core::events::PipelineEvent;
use std::time::Instant;

/// Events emitted by the circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The circuit transitioned between states.
    StateChange {
        key: String,
        timestamp: Instant,
        from: CircuitState,
        to: CircuitState,
        failure_count: usize,
    },
    /// A call was rejected because the circuit is open (or the half-open
    /// probe budget is spent).
    Rejected { key: String, timestamp: Instant },
    /// A call was admitted through the gate.
    Admitted {
        key: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A success was recorded against the circuit.
    SuccessRecorded {
        key: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A failure was recorded against the circuit.
    FailureRecorded {
        key: String,
        timestamp: Instant,
        state: CircuitState,
    },
}

impl PipelineEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateChange { .. } => "state_change",
            CircuitBreakerEvent::Rejected { .. } => "open",
            CircuitBreakerEvent::Admitted { .. } => "admitted",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateChange { timestamp, .. }
            | CircuitBreakerEvent::Rejected { timestamp, .. }
            | CircuitBreakerEvent::Admitted { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn key(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateChange { key, .. }
            | CircuitBreakerEvent::Rejected { key, .. }
            | CircuitBreakerEvent::Admitted { key, .. }
            | CircuitBreakerEvent::SuccessRecorded { key, .. }
            | CircuitBreakerEvent::FailureRecorded { key, .. } => key,
        }
    }
}
