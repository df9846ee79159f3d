//! Capabilities module - what a session's seed capability granted.

mod catalog;
mod state;
mod table;

pub use catalog::{SeedRequest, CAPABILITY_CATALOG, CATALOG_REVISION, EVENT_QUEUE_GET};
pub use state::NegotiatorState;
pub use table::CapabilityTable;
