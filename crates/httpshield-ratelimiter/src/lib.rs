//! Token-bucket rate limiting for the httpshield request engine.
//!
//! Buckets are kept per key (the caller-supplied key or the request host),
//! created lazily on first use, refilled continuously, and garbage
//! collected after a period of inactivity.
//!
//! ## Basic Example
//!
//! ```rust
//! use httpshield_ratelimiter::{Per, RateLimiterConfig, RateLimiterStore, Strategy};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let config = RateLimiterConfig::builder()
//!     .requests(100)
//!     .per(Per::Minute)
//!     .strategy(Strategy::Wait)
//!     .max_wait_time(Duration::from_secs(5))
//!     .name("payments-api")
//!     .build();
//!
//! let store = RateLimiterStore::new();
//! match store.consume("api.example.com", &config).await {
//!     Ok(remaining) => println!("allowed, {remaining:.1} tokens left"),
//!     Err(e) => println!("limited: {e}"),
//! }
//! # }
//! ```
//!
//! ## Adaptive coordination
//!
//! When a circuit breaker guards the same destination, callers pass the
//! observed circuit state as a [`CircuitAdvisory`]. An open circuit scales
//! the effective capacity to 10% of base and a half-open circuit to 50%,
//! for this call only; the persisted bucket is never rewritten with scaled
//! values.
//!
//! ## Server synchronization
//!
//! [`RateLimiterStore::sync_from_server`] overwrites a bucket's token count
//! with the `remaining` quota a server advertised in its response headers,
//! keeping the local bucket from drifting ahead of the real quota.

mod bucket;
mod config;
mod error;
mod events;
mod store;

pub use config::{Per, RateLimiterConfig, RateLimiterConfigBuilder, Strategy};
pub use error::RateLimiterError;
pub use events::RateLimiterEvent;
pub use store::{BucketState, CircuitAdvisory, Decision, RateLimiterStore};

use std::time::Duration;

/// How long an untouched bucket survives before the janitor removes it.
pub const BUCKET_TTL: Duration = Duration::from_secs(5 * 60);

/// How often the bucket janitor runs.
pub const JANITOR_INTERVAL: Duration = Duration::from_secs(60);
