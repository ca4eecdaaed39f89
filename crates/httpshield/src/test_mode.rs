//! The outbound-network gate for tests.
//!
//! When test mode is active, every request fails with `network_blocked`
//! before the pipeline runs, so a test suite cannot accidentally reach a
//! real service. Mock harnesses run the code under test inside
//! [`scope`]`(false, ...)` to open the gate for their own stub adapters.
//!
//! Two switches exist: a process-wide flag for whole-suite protection and
//! a task-local override that wins when set. The task-local form replaces
//! the per-process mutable registries some harnesses rely on with an
//! explicit, inheritance-free scope.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

static GLOBAL: AtomicBool = AtomicBool::new(false);

tokio::task_local! {
    static SCOPED: bool;
}

/// Blocks outbound requests process-wide.
pub fn enable() {
    GLOBAL.store(true, Ordering::Relaxed);
}

/// Re-opens the gate process-wide.
pub fn disable() {
    GLOBAL.store(false, Ordering::Relaxed);
}

/// Whether the current task is blocked from the network.
pub fn is_enabled() -> bool {
    SCOPED
        .try_with(|scoped| *scoped)
        .unwrap_or_else(|_| GLOBAL.load(Ordering::Relaxed))
}

/// Runs `fut` with test mode forced to `enabled` for that task only,
/// overriding the process-wide flag.
pub async fn scope<F: Future>(enabled: bool, fut: F) -> F::Output {
    SCOPED.scope(enabled, fut).await
}
