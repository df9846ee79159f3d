//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the capability core to external systems:
//! - `http` - reqwest-backed seed client and event-queue transport
//! - `workers` - worker pools for asynchronous handler delivery

pub mod http;
pub mod workers;

pub use http::{ReqwestEventQueue, ReqwestSeedClient};
pub use workers::{InlineWorkerPool, TokioWorkerPool};
