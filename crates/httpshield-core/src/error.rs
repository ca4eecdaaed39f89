//! The unified error type for the request engine.
//!
//! Every failure in the engine is surfaced as a returned [`Error`]; no public
//! entry point panics or raises. Transport adapters are contractually
//! non-panicking and translate their underlying failures into the transport
//! variants below; a panicking adapter or middleware stage is caught and
//! converted into [`Error::Middleware`].

use crate::response::Response;
use http::StatusCode;
use thiserror::Error;

/// Errors surfaced by the request engine.
///
/// Display messages are deterministic and keyed off the error kind; they
/// never include header or body content from the request.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The URL could not be parsed, or its scheme/host are unsupported.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The HTTP method is not one the engine accepts.
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Test mode is active and no mock harness handled the request.
    #[error("outbound request blocked: test mode is active")]
    NetworkBlocked,

    /// The transport timed out before a response arrived.
    #[error("request timed out")]
    Timeout,

    /// The connection was closed before a response arrived.
    #[error("connection closed before a response arrived")]
    Closed,

    /// The remote host refused the connection.
    #[error("connection refused")]
    ConnectionRefused,

    /// The connection was reset by the peer.
    #[error("connection reset by peer")]
    ConnectionReset,

    /// The host name could not be resolved.
    #[error("domain name could not be resolved")]
    NxDomain,

    /// The rate limiter denied the request under the `error` strategy.
    #[error("rate limit exceeded")]
    TooManyRequests,

    /// The rate limiter's `wait` strategy could not obtain a token in time.
    #[error("timed out waiting for a rate limit token")]
    RateLimitWaitTimeout,

    /// The circuit breaker rejected the request.
    #[error("service unavailable: circuit breaker is open")]
    ServiceUnavailable,

    /// A deduplicated waiter gave up before the original request finished.
    #[error("timed out waiting for an identical in-flight request")]
    DedupTimeout,

    /// A retryable HTTP status survived all retry attempts.
    #[error("HTTP status {status} after retries were exhausted")]
    HttpStatus {
        /// The final status code.
        status: StatusCode,
        /// The final response, for caller inspection.
        response: Response,
    },

    /// A middleware stage (or the adapter) panicked or misbehaved.
    #[error("middleware stage '{stage}' failed: {message}")]
    Middleware {
        /// Name of the failing stage.
        stage: &'static str,
        /// Human-readable description of the underlying failure.
        message: String,
    },
}

impl Error {
    /// Returns the machine-readable reason atom for this error.
    ///
    /// These are stable identifiers used in telemetry labels.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::InvalidUrl(_) => "invalid_url",
            Error::InvalidMethod(_) => "invalid_method",
            Error::NetworkBlocked => "network_blocked",
            Error::Timeout => "timeout",
            Error::Closed => "closed",
            Error::ConnectionRefused => "econnrefused",
            Error::ConnectionReset => "econnreset",
            Error::NxDomain => "nxdomain",
            Error::TooManyRequests => "too_many_requests",
            Error::RateLimitWaitTimeout => "rate_limit_wait_timeout",
            Error::ServiceUnavailable => "service_unavailable",
            Error::DedupTimeout => "dedup_timeout",
            Error::HttpStatus { .. } => "http_status",
            Error::Middleware { .. } => "middleware_error",
        }
    }

    /// Returns `true` if this transport error may be retried.
    ///
    /// `ConnectionReset` is only retryable when the caller opted in with
    /// `retry_safe`: a reset connection may have already processed a
    /// non-idempotent request on the server side.
    pub fn is_retryable_transport(&self, retry_safe: bool) -> bool {
        match self {
            Error::Timeout | Error::Closed | Error::ConnectionRefused => true,
            Error::ConnectionReset => retry_safe,
            _ => false,
        }
    }

    /// Returns `true` if this error came from a rate limiter gate.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::TooManyRequests | Error::RateLimitWaitTimeout)
    }

    /// Returns `true` if the circuit breaker rejected the request.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Error::ServiceUnavailable)
    }

    /// Returns the final response when the error wraps one.
    pub fn into_response(self) -> Option<Response> {
        match self {
            Error::HttpStatus { response, .. } => Some(response),
            _ => None,
        }
    }
}
