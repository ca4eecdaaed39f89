use httpshield_core::events::PipelineEvent;
use std::time::Instant;

/// Events emitted by the deduplicator.
///
/// `Wait` and `CacheHit` mark requests that were satisfied without ever
/// consulting the rate limiter or circuit breaker; the deduplicator runs
/// first in the pipeline precisely so duplicates bypass both gates.
#[derive(Debug, Clone)]
pub enum DedupEvent {
    /// The request is the leader and will execute.
    Execute { key: String, timestamp: Instant },
    /// The request joined an in-flight leader as a waiter.
    Wait { key: String, timestamp: Instant },
    /// The request was served from a recently completed response.
    CacheHit { key: String, timestamp: Instant },
    /// The leader finished and its response was delivered.
    Completed {
        key: String,
        timestamp: Instant,
        waiters: usize,
    },
    /// The leader failed or was abandoned; the entry was dropped.
    Cancelled { key: String, timestamp: Instant },
}

impl PipelineEvent for DedupEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DedupEvent::Execute { .. } => "execute",
            DedupEvent::Wait { .. } => "wait",
            DedupEvent::CacheHit { .. } => "cache_hit",
            DedupEvent::Completed { .. } => "completed",
            DedupEvent::Cancelled { .. } => "cancelled",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            DedupEvent::Execute { timestamp, .. }
            | DedupEvent::Wait { timestamp, .. }
            | DedupEvent::CacheHit { timestamp, .. }
            | DedupEvent::Completed { timestamp, .. }
            | DedupEvent::Cancelled { timestamp, .. } => *timestamp,
        }
    }

    fn key(&self) -> &str {
        match self {
            DedupEvent::Execute { key, .. }
            | DedupEvent::Wait { key, .. }
            | DedupEvent::CacheHit { key, .. }
            | DedupEvent::Completed { key, .. }
            | DedupEvent::Cancelled { key, .. } => key,
        }
    }
}
