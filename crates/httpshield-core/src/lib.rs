//! Core infrastructure for the httpshield request engine.
//!
//! This crate provides shared functionality used across all httpshield crates:
//! - The request/response data model
//! - The unified error type
//! - Event system for observability
//! - Rate-limit response header parsing (`X-RateLimit-*`, `RateLimit-*`,
//!   Stripe, and `Retry-After`)

pub mod error;
pub mod events;
pub mod headers;
pub mod request;
pub mod response;
pub mod sanitize;

pub use error::Error;
pub use events::{EventListener, EventListeners, FnListener, PipelineEvent};
pub use headers::{parse_rate_limit_headers, parse_retry_after, RateLimitFormat, ServerRateLimit};
pub use request::{Extensions, Request, RequestBuilder};
pub use response::Response;
pub use sanitize::sanitize_url;
