//! The middleware pipeline contract.
//!
//! Stages run in a fixed, meaningful order ahead of the adapter call:
//!
//! 1. **Dedup**, so cache hits and waiters never consume rate-limit
//!    tokens or circuit slots. On hot keys this multiplies effective
//!    capacity several times over.
//! 2. **Rate limiter**, so a rate-limit rejection never counts as a
//!    circuit failure.
//! 3. **Circuit breaker**, which guards the adapter call itself.
//!
//! A stage either lets the request continue (possibly after modifying it in
//! place), halts with a ready response, or fails with an error. Halting or
//! failing skips the remaining stages and the adapter, but post-adapter
//! hooks already registered in the request's extensions run on every exit
//! path; that is how the circuit breaker records exactly one outcome and
//! the deduplicator always settles its in-flight entry.
//!
//! Disabled stages are never constructed, so they cost nothing per request.

use futures::future::BoxFuture;
use httpshield_core::{Error, Request, Response};

/// What a stage decided about the request.
pub enum StageFlow {
    /// Advance to the next stage (the stage may have modified the request).
    Continue,
    /// Skip the remaining stages and the adapter; this is the response.
    Halt(Response),
    /// Skip the remaining stages and the adapter; this is the failure.
    Fail(Error),
}

/// One pipeline stage.
pub trait Stage: Send + Sync {
    /// Stable stage name, used in `middleware_error` reasons and telemetry.
    fn name(&self) -> &'static str;

    /// Inspects the request and decides how the pipeline proceeds.
    fn handle<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, StageFlow>;
}

type Hook = Box<dyn FnOnce(&Result<Response, Error>) + Send>;

/// Hooks queued by stages for execution after the adapter call (or after a
/// halt). Stored in the request's extensions and drained by the executor.
#[derive(Default)]
pub(crate) struct PostHooks {
    hooks: Vec<Hook>,
}

impl PostHooks {
    /// Runs the hooks in registration order.
    pub(crate) fn run(self, outcome: &Result<Response, Error>) {
        for hook in self.hooks {
            hook(outcome);
        }
    }
}

/// Queues a hook to run once the request settles.
pub fn register_post_hook<F>(request: &mut Request, hook: F)
where
    F: FnOnce(&Result<Response, Error>) + Send + 'static,
{
    if let Some(hooks) = request.extensions_mut().get_mut::<PostHooks>() {
        hooks.hooks.push(Box::new(hook));
    } else {
        request.extensions_mut().insert(PostHooks {
            hooks: vec![Box::new(hook)],
        });
    }
}

/// Removes the queued hooks from the request, if any.
pub(crate) fn take_post_hooks(request: &mut Request) -> Option<PostHooks> {
    request.extensions_mut().remove::<PostHooks>()
}

/// Renders a panic payload for `middleware_error` messages.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
