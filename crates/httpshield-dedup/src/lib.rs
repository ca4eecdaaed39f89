//! In-flight request deduplication for the httpshield request engine.
//!
//! When several identical requests run concurrently, only the first one
//! (the leader) reaches the transport. The rest subscribe to the leader's
//! result and receive a clone of its response. Responses also linger in a
//! short-lived completed cache so requests arriving just after the leader
//! finished still reuse its response.
//!
//! Identity is a SHA-256 fingerprint of `method:url:body`, overridable with
//! an explicit key.
//!
//! ## Example
//!
//! ```rust
//! use httpshield_dedup::{Begin, DedupConfig, DedupRegistry};
//! use std::sync::Arc;
//!
//! # async fn example(response: httpshield_core::Response) {
//! let registry = Arc::new(DedupRegistry::new());
//! let config = DedupConfig::builder().name("payments").build();
//!
//! match registry.check("fingerprint", &config) {
//!     Begin::Execute(token) => {
//!         // ... perform the request ...
//!         token.complete(&config, &response);
//!     }
//!     Begin::Wait(waiter) => {
//!         let shared = waiter.wait().await;
//!     }
//!     Begin::Cached(shared) => {
//!         // reuse the recent response
//!     }
//! }
//! # }
//! ```

mod config;
mod events;
mod fingerprint;
mod registry;

pub use config::{DedupConfig, DedupConfigBuilder};
pub use events::DedupEvent;
pub use fingerprint::fingerprint;
pub use registry::{Begin, DedupRegistry, ExecutionToken, Waiter};

use std::time::Duration;

/// How often the completed-entry janitor runs.
pub const JANITOR_INTERVAL: Duration = Duration::from_secs(1);
