use httpshield_core::events::PipelineEvent;
use std::time::{Duration, Instant};

/// Events emitted by the retry executor.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// A retry is about to happen after `delay`; `attempt` is the upcoming
    /// attempt number and `reason` the failure being retried.
    Attempt {
        name: String,
        timestamp: Instant,
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    /// The operation succeeded after `attempts` attempts.
    Succeeded {
        name: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// The attempt budget ran out; the last failure is surfaced.
    Exhausted {
        name: String,
        timestamp: Instant,
        attempts: u32,
    },
}

impl PipelineEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Attempt { .. } => "attempt",
            RetryEvent::Succeeded { .. } => "succeeded",
            RetryEvent::Exhausted { .. } => "exhausted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Attempt { timestamp, .. }
            | RetryEvent::Succeeded { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. } => *timestamp,
        }
    }

    fn key(&self) -> &str {
        match self {
            RetryEvent::Attempt { name, .. }
            | RetryEvent::Succeeded { name, .. }
            | RetryEvent::Exhausted { name, .. } => name,
        }
    }
}
