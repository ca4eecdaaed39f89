//! Resilient HTTP request execution over a pluggable transport.
//!
//! This crate is the engine that sits between a thin client facade and a
//! transport adapter, adding the reliability layers production HTTP
//! clients need:
//!
//! - **Deduplication** of identical in-flight requests (single-flight with
//!   a short completed-response cache)
//! - **Rate limiting** with per-key token buckets, server-header
//!   synchronization, and circuit-adaptive capacity
//! - **Circuit breaking** per destination with race-free half-open probing
//! - **Retries** with capped exponential backoff, jitter, and
//!   `Retry-After` honoring
//!
//! The stages run in a fixed order (dedup, rate limit, circuit breaker)
//! and the retry loop wraps only the adapter call, so each logical request
//! charges one token, one circuit outcome, and one dedup entry no matter
//! how many attempts it takes.
//!
//! ## Example
//!
//! ```rust
//! use httpshield::{adapter_fn, ClientOptions, Engine, Profile};
//! use httpshield_core::{Request, Response};
//! use http::{Method, StatusCode};
//!
//! # async fn example() -> Result<(), httpshield_core::Error> {
//! let engine = Engine::new(ClientOptions::new().profile(Profile::HighVolumeApi));
//!
//! // Any transport works; tests usually script one from a closure.
//! let adapter = adapter_fn(|_req| async {
//!     Ok(Response::from_status(StatusCode::OK))
//! });
//!
//! let request = Request::builder(Method::GET, "https://api.example.com/v1/items").build()?;
//! let response = engine.execute(request, &adapter).await?;
//! assert_eq!(response.status(), StatusCode::OK);
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! The engine never panics across its public surface: stage and adapter
//! panics are contained and surfaced as `middleware_error`, and every
//! failure comes back as an [`Error`](httpshield_core::Error) value.
//!
//! ## Feature flags
//! - `tracing`: structured logging across the engine and all subsystems
//! - `metrics`: Prometheus metrics across the engine and all subsystems

mod adapter;
mod engine;
mod options;
pub mod pipeline;
mod stages;
pub mod telemetry;
pub mod test_mode;

pub use adapter::{adapter_fn, Adapter, AdapterOptions, FnAdapter, Proxy};
pub use engine::{Engine, EngineBuilder};
pub use options::{
    CircuitBreakerOptions, ClientOptions, DedupOptions, Profile, RateLimitOptions, Toggle,
};
pub use pipeline::{register_post_hook, Stage, StageFlow};
pub use telemetry::RequestEvent;

pub use httpshield_core::{Error, Request, RequestBuilder, Response};

// The component crates' public surfaces, for callers configuring or
// listening to a single subsystem directly.
pub use httpshield_circuitbreaker as circuitbreaker;
pub use httpshield_dedup as dedup;
pub use httpshield_ratelimiter as ratelimiter;
pub use httpshield_retry as retry;
