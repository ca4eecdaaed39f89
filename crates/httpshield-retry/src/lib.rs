//! Retry execution for the httpshield request engine.
//!
//! [`execute`] wraps a single adapter call with an attempt loop. It is
//! deliberately *not* a pipeline stage: the pipeline (dedup, rate limiter,
//! circuit breaker) runs exactly once per logical request, while the
//! attempts happen inside this wrapper. That keeps the accounting right:
//! one dedup entry, one rate-limit token, one circuit outcome per request,
//! however many attempts it takes.
//!
//! ## Attempt classification
//!
//! - Responses with status 408, 429, 500, 502, 503, or 504 are retried
//!   while budget remains; once the budget is spent they surface as
//!   `Error::HttpStatus`. All other statuses return as success for the
//!   caller to inspect.
//! - `timeout`, `closed`, and `econnrefused` transport errors always
//!   retry; `econnreset` only under `retry_safe`. Everything else
//!   surfaces immediately.
//!
//! ## Delays
//!
//! Delays follow capped exponential backoff with subtractive jitter
//! (see [`backoff_delay`]). A 429 or 503 response carrying a parseable
//! `Retry-After` header replaces the computed backoff with the server's
//! delay.
//!
//! ## Example
//!
//! ```rust
//! use httpshield_retry::{execute, RetryPolicy};
//! use httpshield_core::{Error, Response};
//! use http::StatusCode;
//!
//! # async fn example() {
//! let policy = RetryPolicy::builder()
//!     .max_retries(3)
//!     .name("payments")
//!     .build();
//!
//! let result = execute(&policy, |_attempt| async {
//!     Ok::<_, Error>(Response::from_status(StatusCode::OK))
//! })
//! .await;
//! # }
//! ```

mod backoff;
mod events;
mod policy;

pub use backoff::backoff_delay;
pub use events::RetryEvent;
pub use policy::{RetryPolicy, RetryPolicyBuilder};

use httpshield_core::headers::parse_retry_after;
use httpshield_core::{Error, Response};
use http::StatusCode;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Returns true for the statuses worth another attempt.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
}

/// Runs `op` until it succeeds, fails unretryably, or the attempt budget
/// is spent. `op` receives the 1-based attempt number.
pub async fn execute<F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<Response, Error>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Response, Error>>,
{
    let mut attempt: u32 = 1;
    loop {
        let outcome = op(attempt).await;

        let (reason, retry_after) = match &outcome {
            Ok(response) if is_retryable_status(response.status()) => (
                format!("http_{}", response.status().as_u16()),
                server_delay(response),
            ),
            Ok(response) => {
                policy.event_listeners.emit(&RetryEvent::Succeeded {
                    name: policy.name.clone(),
                    timestamp: Instant::now(),
                    attempts: attempt,
                });
                return Ok(response.clone());
            }
            Err(error) if error.is_retryable_transport(policy.retry_safe) => {
                (error.reason().to_string(), None)
            }
            Err(error) => return Err(error.clone()),
        };

        if attempt >= policy.max_retries {
            policy.event_listeners.emit(&RetryEvent::Exhausted {
                name: policy.name.clone(),
                timestamp: Instant::now(),
                attempts: attempt,
            });

            #[cfg(feature = "metrics")]
            counter!("retry_exhausted_total", "retry" => policy.name.clone()).increment(1);

            return match outcome {
                Ok(response) => Err(Error::HttpStatus {
                    status: response.status(),
                    response,
                }),
                Err(error) => Err(error),
            };
        }

        let delay = retry_after.unwrap_or_else(|| backoff_delay(policy, attempt));
        attempt += 1;

        policy.event_listeners.emit(&RetryEvent::Attempt {
            name: policy.name.clone(),
            timestamp: Instant::now(),
            attempt,
            delay,
            reason: reason.clone(),
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(
            retry = %policy.name,
            attempt,
            delay_ms = delay.as_millis() as u64,
            reason = %reason,
            "retrying after delay"
        );

        #[cfg(feature = "metrics")]
        counter!("retry_attempts_total", "retry" => policy.name.clone()).increment(1);

        sleep(delay).await;
    }
}

/// `Retry-After` applies only to 429 and 503; other retryable statuses use
/// computed backoff even when the header is present.
fn server_delay(response: &Response) -> Option<Duration> {
    match response.status().as_u16() {
        429 | 503 => parse_retry_after(response.headers()),
        _ => None,
    }
}
