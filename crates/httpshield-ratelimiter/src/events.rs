use crate::config::Strategy;
use httpshield_core::events::PipelineEvent;
use std::time::{Duration, Instant};

/// Events emitted by the rate limiter.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A token was consumed.
    Consumed {
        key: String,
        timestamp: Instant,
        remaining: f64,
    },
    /// The calling task is about to sleep for a token.
    Waiting {
        key: String,
        timestamp: Instant,
        wait: Duration,
        strategy: Strategy,
    },
    /// The request was rejected (empty bucket with `error` strategy, or the
    /// wait budget was exhausted).
    Exceeded {
        key: String,
        timestamp: Instant,
        strategy: Strategy,
    },
    /// Capacity was scaled down because of the circuit breaker's state.
    AdaptiveReduction {
        key: String,
        timestamp: Instant,
        original_rate: f64,
        adjusted_rate: f64,
        reduction_factor: f64,
        circuit_state: &'static str,
    },
    /// The bucket was overwritten from server-advertised quota headers.
    Synced {
        key: String,
        timestamp: Instant,
        remaining: f64,
    },
}

impl PipelineEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::Consumed { .. } => "ok",
            RateLimiterEvent::Waiting { .. } => "wait",
            RateLimiterEvent::Exceeded { .. } => "exceeded",
            RateLimiterEvent::AdaptiveReduction { .. } => "adaptive_reduction",
            RateLimiterEvent::Synced { .. } => "synced",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::Consumed { timestamp, .. }
            | RateLimiterEvent::Waiting { timestamp, .. }
            | RateLimiterEvent::Exceeded { timestamp, .. }
            | RateLimiterEvent::AdaptiveReduction { timestamp, .. }
            | RateLimiterEvent::Synced { timestamp, .. } => *timestamp,
        }
    }

    fn key(&self) -> &str {
        match self {
            RateLimiterEvent::Consumed { key, .. }
            | RateLimiterEvent::Waiting { key, .. }
            | RateLimiterEvent::Exceeded { key, .. }
            | RateLimiterEvent::AdaptiveReduction { key, .. }
            | RateLimiterEvent::Synced { key, .. } => key,
        }
    }
}
