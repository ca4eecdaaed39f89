//! The transport adapter contract.
//!
//! The engine is transport-agnostic: anything that can turn a request into
//! a response (or a transport error) plugs in here. Adapters must not
//! panic; they translate their underlying failures into the transport
//! variants of [`Error`]. A panicking adapter is contained by the engine
//! and surfaced as a `middleware_error`, but that is a contract violation,
//! not a supported path.

use futures::future::BoxFuture;
use httpshield_core::{Error, Request, Response};
use std::future::Future;
use std::time::Duration;

/// Proxy selection forwarded to the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Proxy {
    /// Use the system-configured proxy.
    #[default]
    System,
    /// Connect directly, ignoring any system proxy.
    Disabled,
    /// Use an explicit proxy.
    Custom {
        /// Proxy host.
        host: String,
        /// Proxy port.
        port: u16,
    },
}

/// Transport settings the engine forwards verbatim to the adapter.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    /// Overall transport timeout.
    pub timeout: Duration,
    /// Whether to verify TLS certificates.
    pub ssl_verify: bool,
    /// Proxy selection.
    pub proxy: Proxy,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            ssl_verify: true,
            proxy: Proxy::System,
        }
    }
}

/// A pluggable transport.
pub trait Adapter: Send + Sync {
    /// Performs one attempt of the request.
    fn send<'a>(
        &'a self,
        request: &'a Request,
        options: &'a AdapterOptions,
    ) -> BoxFuture<'a, Result<Response, Error>>;
}

/// An [`Adapter`] built from a closure; the test-harness workhorse.
pub struct FnAdapter<F> {
    f: F,
}

/// Wraps a closure as an adapter.
///
/// ```rust
/// use httpshield::adapter_fn;
/// use httpshield_core::Response;
/// use http::StatusCode;
///
/// let adapter = adapter_fn(|_req| async { Ok(Response::from_status(StatusCode::OK)) });
/// ```
pub fn adapter_fn<F, Fut>(f: F) -> FnAdapter<F>
where
    F: Fn(&Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, Error>> + Send + 'static,
{
    FnAdapter { f }
}

impl<F, Fut> Adapter for FnAdapter<F>
where
    F: Fn(&Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, Error>> + Send + 'static,
{
    fn send<'a>(
        &'a self,
        request: &'a Request,
        _options: &'a AdapterOptions,
    ) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin((self.f)(request))
    }
}
