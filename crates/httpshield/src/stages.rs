//! The built-in pipeline stages.

use crate::pipeline::{register_post_hook, Stage, StageFlow};
use futures::future::BoxFuture;
use httpshield_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
use httpshield_core::{Error, Request};
use httpshield_dedup::{Begin, DedupConfig, DedupRegistry};
use httpshield_ratelimiter::{CircuitAdvisory, RateLimiterConfig, RateLimiterStore};
use std::sync::Arc;

/// Deduplication stage: first in the pipeline so duplicates settle before
/// any token or circuit slot is spent.
pub(crate) struct DedupStage {
    registry: Arc<DedupRegistry>,
    config: Arc<DedupConfig>,
    key: String,
}

impl DedupStage {
    pub(crate) fn new(registry: Arc<DedupRegistry>, config: Arc<DedupConfig>, key: String) -> Self {
        Self {
            registry,
            config,
            key,
        }
    }
}

impl Stage for DedupStage {
    fn name(&self) -> &'static str {
        "dedup"
    }

    fn handle<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, StageFlow> {
        Box::pin(async move {
            match self.registry.check(&self.key, &self.config) {
                Begin::Execute(token) => {
                    let config = Arc::clone(&self.config);
                    register_post_hook(request, move |outcome| match outcome {
                        Ok(response) => token.complete(&config, response),
                        Err(_) => token.cancel(&config),
                    });
                    StageFlow::Continue
                }
                Begin::Wait(waiter) => match waiter.wait().await {
                    Ok(response) => StageFlow::Halt(response),
                    Err(error) => StageFlow::Fail(error),
                },
                Begin::Cached(response) => StageFlow::Halt(response),
            }
        })
    }
}

/// Rate limiter stage: consumes one token per logical request, with the
/// circuit's state as an advisory capacity signal when adaptive mode is
/// on.
pub(crate) struct RateLimitStage {
    store: Arc<RateLimiterStore>,
    config: Arc<RateLimiterConfig>,
    key: String,
    circuits: Arc<CircuitBreakerRegistry>,
    circuit_key: String,
}

impl RateLimitStage {
    pub(crate) fn new(
        store: Arc<RateLimiterStore>,
        config: Arc<RateLimiterConfig>,
        key: String,
        circuits: Arc<CircuitBreakerRegistry>,
        circuit_key: String,
    ) -> Self {
        Self {
            store,
            config,
            key,
            circuits,
            circuit_key,
        }
    }

    fn advisory(&self) -> CircuitAdvisory {
        if !self.config.is_adaptive() {
            return CircuitAdvisory::Closed;
        }
        match self.circuits.state(&self.circuit_key) {
            Some(CircuitState::Open) => CircuitAdvisory::Open,
            Some(CircuitState::HalfOpen) => CircuitAdvisory::HalfOpen,
            Some(CircuitState::Closed) | None => CircuitAdvisory::Closed,
        }
    }
}

impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn handle<'a>(&'a self, _request: &'a mut Request) -> BoxFuture<'a, StageFlow> {
        Box::pin(async move {
            match self
                .store
                .consume_with(&self.key, &self.config, self.advisory())
                .await
            {
                Ok(_) => StageFlow::Continue,
                Err(error) => StageFlow::Fail(error.into()),
            }
        })
    }
}

/// Circuit breaker stage: last gate before the adapter. Records exactly
/// one outcome per logical request via a post-adapter hook, and only when
/// the gate admitted the request; rejected calls record nothing.
pub(crate) struct CircuitStage {
    registry: Arc<CircuitBreakerRegistry>,
    config: Arc<CircuitBreakerConfig>,
    key: String,
}

impl CircuitStage {
    pub(crate) fn new(
        registry: Arc<CircuitBreakerRegistry>,
        config: Arc<CircuitBreakerConfig>,
        key: String,
    ) -> Self {
        Self {
            registry,
            config,
            key,
        }
    }
}

impl Stage for CircuitStage {
    fn name(&self) -> &'static str {
        "circuit_breaker"
    }

    fn handle<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, StageFlow> {
        Box::pin(async move {
            if !self.registry.try_acquire(&self.key, &self.config) {
                return StageFlow::Fail(Error::ServiceUnavailable);
            }

            let registry = Arc::clone(&self.registry);
            let config = Arc::clone(&self.config);
            let key = self.key.clone();
            register_post_hook(request, move |outcome| match outcome {
                Ok(_) => registry.record_success(&key, &config),
                Err(_) => registry.record_failure(&key, &config),
            });
            StageFlow::Continue
        })
    }
}
