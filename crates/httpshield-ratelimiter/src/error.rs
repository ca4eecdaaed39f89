use httpshield_core::Error;
use thiserror::Error as ThisError;

/// Errors returned by [`RateLimiterStore::consume`](crate::RateLimiterStore::consume).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum RateLimiterError {
    /// The bucket was empty and the policy uses the `error` strategy.
    #[error("rate limit exceeded")]
    Exceeded,

    /// The `wait` strategy could not obtain a token within `max_wait_time`.
    #[error("timed out waiting for a rate limit token")]
    WaitTimeout,
}

impl From<RateLimiterError> for Error {
    fn from(err: RateLimiterError) -> Self {
        match err {
            RateLimiterError::Exceeded => Error::TooManyRequests,
            RateLimiterError::WaitTimeout => Error::RateLimitWaitTimeout,
        }
    }
}
