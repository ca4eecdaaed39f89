//! The request execution engine.

use crate::adapter::{Adapter, AdapterOptions};
use crate::options::{ClientOptions, Toggle};
use crate::pipeline::{panic_message, take_post_hooks, Stage, StageFlow};
use crate::stages::{CircuitStage, DedupStage, RateLimitStage};
use crate::telemetry::{RequestEvent, RequestSpan};
use crate::test_mode;
use futures::FutureExt;
use httpshield_circuitbreaker::{
    CircuitBreakerConfig, CircuitBreakerEvent, CircuitBreakerRegistry,
};
use httpshield_core::events::{EventListener, EventListeners};
use httpshield_core::headers::{parse_rate_limit_headers, RateLimitFormat};
use httpshield_core::{Error, Request, Response};
use httpshield_dedup::{fingerprint, DedupConfig, DedupRegistry};
use httpshield_ratelimiter::{RateLimiterConfig, RateLimiterEvent, RateLimiterStore};
use httpshield_retry::{RetryEvent, RetryPolicy};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The per-request execution plan, resolved from the merged options before
/// the pipeline runs. Stages for disabled components simply do not exist.
struct Plan {
    stages: Vec<Box<dyn Stage>>,
    policy: RetryPolicy,
    adapter_options: AdapterOptions,
    rate_limit: Option<(Arc<RateLimiterConfig>, String)>,
}

/// The request engine: shared keyed stores, client-level options, and the
/// pipeline executor.
///
/// One engine is meant to live for the life of the process (or client). It
/// owns the three keyed stores and their background janitors; dropping the
/// engine aborts the janitors.
pub struct Engine {
    options: ClientOptions,
    rate_limiter: Arc<RateLimiterStore>,
    circuits: Arc<CircuitBreakerRegistry>,
    dedup: Arc<DedupRegistry>,
    request_listeners: EventListeners<RequestEvent>,
    rate_limiter_listeners: EventListeners<RateLimiterEvent>,
    circuit_listeners: EventListeners<CircuitBreakerEvent>,
    dedup_listeners: EventListeners<httpshield_dedup::DedupEvent>,
    retry_listeners: EventListeners<RetryEvent>,
    janitors: Vec<tokio::task::JoinHandle<()>>,
}

impl Engine {
    /// Creates an engine with the given client options.
    ///
    /// Must be called inside a Tokio runtime; the janitor tasks are
    /// spawned here.
    pub fn new(options: ClientOptions) -> Self {
        Engine::builder().options(options).build()
    }

    /// Returns a builder for registering event listeners.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The engine's client-level options.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The shared rate limiter store, for inspection and manual resets.
    pub fn rate_limiter(&self) -> &Arc<RateLimiterStore> {
        &self.rate_limiter
    }

    /// The shared circuit registry, for inspection and manual control.
    pub fn circuit_breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.circuits
    }

    /// The shared dedup registry.
    pub fn dedup(&self) -> &Arc<DedupRegistry> {
        &self.dedup
    }

    /// Executes one logical request through the pipeline and the adapter,
    /// using the engine's options.
    pub async fn execute(&self, request: Request, adapter: &dyn Adapter) -> Result<Response, Error> {
        self.execute_with(request, ClientOptions::new(), adapter).await
    }

    /// Executes one logical request with per-request option overrides.
    pub async fn execute_with(
        &self,
        mut request: Request,
        overrides: ClientOptions,
        adapter: &dyn Adapter,
    ) -> Result<Response, Error> {
        let options = overrides.shallow_over(&self.options);
        let mut span = RequestSpan::start(&request, &self.request_listeners);

        if options.test_mode || test_mode::is_enabled() {
            let outcome = Err(Error::NetworkBlocked);
            span.finish(&outcome);
            return outcome;
        }

        if let Some(defaults) = &options.headers {
            for (name, value) in defaults.iter() {
                if !request.headers().contains_key(name) {
                    request.headers_mut().insert(name, value.clone());
                }
            }
        }

        let retries = Arc::new(AtomicU32::new(0));
        let plan = self.resolve(&options, &request, &retries);

        let mut halted: Option<Result<Response, Error>> = None;
        for stage in &plan.stages {
            let flow = match AssertUnwindSafe(stage.handle(&mut request))
                .catch_unwind()
                .await
            {
                Ok(flow) => flow,
                Err(payload) => StageFlow::Fail(Error::Middleware {
                    stage: stage.name(),
                    message: panic_message(payload.as_ref()),
                }),
            };
            match flow {
                StageFlow::Continue => {}
                StageFlow::Halt(response) => {
                    halted = Some(Ok(response));
                    break;
                }
                StageFlow::Fail(error) => {
                    halted = Some(Err(error));
                    break;
                }
            }
        }

        let outcome = match halted {
            Some(outcome) => outcome,
            None => {
                let result = httpshield_retry::execute(&plan.policy, |_attempt| {
                    let fut = adapter.send(&request, &plan.adapter_options);
                    async move {
                        match AssertUnwindSafe(fut).catch_unwind().await {
                            Ok(result) => result,
                            Err(payload) => Err(Error::Middleware {
                                stage: "adapter",
                                message: panic_message(payload.as_ref()),
                            }),
                        }
                    }
                })
                .await;

                if let (Ok(response), Some((config, key))) = (&result, &plan.rate_limit) {
                    if let Some(server) =
                        parse_rate_limit_headers(response.headers(), RateLimitFormat::Auto)
                    {
                        self.rate_limiter.sync_from_server(key, &server, config);
                    }
                }

                result
            }
        };

        if let Some(hooks) = take_post_hooks(&mut request) {
            hooks.run(&outcome);
        }

        span.set_retries(retries.load(Ordering::Relaxed));
        span.finish(&outcome);
        outcome
    }

    fn resolve(
        &self,
        options: &ClientOptions,
        request: &Request,
        retries: &Arc<AtomicU32>,
    ) -> Plan {
        let host = request.url().host_str().unwrap_or_default().to_string();
        let circuit_key = options
            .circuit_breaker_key
            .clone()
            .unwrap_or_else(|| host.clone());

        let mut stages: Vec<Box<dyn Stage>> = Vec::new();
        let mut rate_limit = None;

        if let Toggle::Enabled(opts) = &options.deduplicate {
            if opts.enabled.unwrap_or(true) {
                let mut builder = DedupConfig::builder()
                    .name(host.clone())
                    .listeners(&self.dedup_listeners);
                if let Some(ttl) = opts.ttl {
                    builder = builder.completed_ttl(ttl);
                }
                if let Some(key) = &opts.key {
                    builder = builder.key(key.clone());
                }
                let config = Arc::new(builder.build());
                let key = config.key().map(str::to_string).unwrap_or_else(|| {
                    fingerprint(
                        request.method(),
                        request.url(),
                        request.body().map(|b| b.as_ref()),
                    )
                });
                stages.push(Box::new(DedupStage::new(
                    Arc::clone(&self.dedup),
                    config,
                    key,
                )));
            }
        }

        if let Toggle::Enabled(opts) = &options.rate_limit {
            if opts.enabled.unwrap_or(true) {
                let mut builder = RateLimiterConfig::builder()
                    .name(host.clone())
                    .listeners(&self.rate_limiter_listeners);
                if let Some(requests) = opts.requests {
                    builder = builder.requests(requests);
                }
                if let Some(per) = opts.per {
                    builder = builder.per(per);
                }
                if let Some(strategy) = opts.strategy {
                    builder = builder.strategy(strategy);
                }
                if let Some(max_wait_time) = opts.max_wait_time {
                    builder = builder.max_wait_time(max_wait_time);
                }
                if let Some(adaptive) = opts.adaptive {
                    builder = builder.adaptive(adaptive);
                }
                let config = Arc::new(builder.build());
                let key = options
                    .rate_limit_key
                    .clone()
                    .unwrap_or_else(|| host.clone());
                rate_limit = Some((Arc::clone(&config), key.clone()));
                stages.push(Box::new(RateLimitStage::new(
                    Arc::clone(&self.rate_limiter),
                    config,
                    key,
                    Arc::clone(&self.circuits),
                    circuit_key.clone(),
                )));
            }
        }

        if let Toggle::Enabled(opts) = &options.circuit_breaker {
            if opts.enabled.unwrap_or(true) {
                let mut builder = CircuitBreakerConfig::builder()
                    .name(host.clone())
                    .listeners(&self.circuit_listeners);
                if let Some(threshold) = opts.failure_threshold {
                    builder = builder.failure_threshold(threshold);
                }
                if let Some(percentage) = opts.failure_threshold_percentage {
                    builder = builder.failure_threshold_percentage(percentage);
                }
                if let Some(window_size) = opts.window_size {
                    builder = builder.window_size(window_size);
                }
                if let Some(timeout) = opts.timeout {
                    builder = builder.timeout(timeout);
                }
                if let Some(requests) = opts.half_open_requests {
                    builder = builder.half_open_requests(requests);
                }
                stages.push(Box::new(CircuitStage::new(
                    Arc::clone(&self.circuits),
                    Arc::new(builder.build()),
                    circuit_key,
                )));
            }
        }

        let retries = Arc::clone(retries);
        let mut policy_builder = RetryPolicy::builder()
            .name(host)
            .listeners(&self.retry_listeners)
            .on_attempt(move |_, _| {
                retries.fetch_add(1, Ordering::Relaxed);
            });
        if let Some(max_retries) = options.max_retries {
            policy_builder = policy_builder.max_retries(max_retries);
        }
        if let Some(retry_safe) = options.retry_safe {
            policy_builder = policy_builder.retry_safe(retry_safe);
        }
        if let Some(base_delay) = options.base_delay {
            policy_builder = policy_builder.base_delay(base_delay);
        }
        if let Some(max_delay) = options.max_delay {
            policy_builder = policy_builder.max_delay(max_delay);
        }
        if let Some(jitter_factor) = options.jitter_factor {
            policy_builder = policy_builder.jitter_factor(jitter_factor);
        }

        Plan {
            stages,
            policy: policy_builder.build(),
            adapter_options: options.adapter_options(),
            rate_limit,
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        for janitor in &self.janitors {
            janitor.abort();
        }
    }
}

/// Builder for [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    options: ClientOptions,
    request_listeners: EventListeners<RequestEvent>,
    rate_limiter_listeners: EventListeners<RateLimiterEvent>,
    circuit_listeners: EventListeners<CircuitBreakerEvent>,
    dedup_listeners: EventListeners<httpshield_dedup::DedupEvent>,
    retry_listeners: EventListeners<RetryEvent>,
}

impl EngineBuilder {
    /// Sets the client-level options.
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Subscribes to request span events.
    pub fn on_request_event<L>(mut self, listener: L) -> Self
    where
        L: EventListener<RequestEvent> + 'static,
    {
        self.request_listeners.add(listener);
        self
    }

    /// Subscribes to rate limiter events.
    pub fn on_rate_limiter_event<L>(mut self, listener: L) -> Self
    where
        L: EventListener<RateLimiterEvent> + 'static,
    {
        self.rate_limiter_listeners.add(listener);
        self
    }

    /// Subscribes to circuit breaker events.
    pub fn on_circuit_breaker_event<L>(mut self, listener: L) -> Self
    where
        L: EventListener<CircuitBreakerEvent> + 'static,
    {
        self.circuit_listeners.add(listener);
        self
    }

    /// Subscribes to deduplicator events.
    pub fn on_dedup_event<L>(mut self, listener: L) -> Self
    where
        L: EventListener<httpshield_dedup::DedupEvent> + 'static,
    {
        self.dedup_listeners.add(listener);
        self
    }

    /// Subscribes to retry events.
    pub fn on_retry_event<L>(mut self, listener: L) -> Self
    where
        L: EventListener<RetryEvent> + 'static,
    {
        self.retry_listeners.add(listener);
        self
    }

    /// Builds the engine and spawns its janitors.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn build(self) -> Engine {
        let rate_limiter = Arc::new(RateLimiterStore::new());
        let dedup = Arc::new(DedupRegistry::new());

        let completed_ttl = match &self.options.deduplicate {
            Toggle::Enabled(opts) => opts.ttl.unwrap_or(Duration::from_millis(500)),
            _ => Duration::from_millis(500),
        };

        let janitors = vec![
            rate_limiter.spawn_janitor(
                httpshield_ratelimiter::JANITOR_INTERVAL,
                httpshield_ratelimiter::BUCKET_TTL,
            ),
            dedup.spawn_janitor(httpshield_dedup::JANITOR_INTERVAL, completed_ttl),
        ];

        Engine {
            options: self.options,
            rate_limiter,
            circuits: Arc::new(CircuitBreakerRegistry::new()),
            dedup,
            request_listeners: self.request_listeners,
            rate_limiter_listeners: self.rate_limiter_listeners,
            circuit_listeners: self.circuit_listeners,
            dedup_listeners: self.dedup_listeners,
            retry_listeners: self.retry_listeners,
            janitors,
        }
    }
}
