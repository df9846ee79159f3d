//! Ports - Interfaces for external collaborators.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the capability core and the outside world. Adapters implement these ports.
//!
//! ## Network Ports
//!
//! - `SeedClient` - Issues the seed capability request
//! - `EventQueueTransport` - Carries one long-poll round trip
//!
//! ## Session Ports
//!
//! - `SessionLink` - The owning session (connection status, origin id)
//!
//! ## Dispatch Ports
//!
//! - `CapsEventHandler` / `PacketHandler` - Subscriber callbacks
//! - `WorkerPool` - Where asynchronous handler invocations run

mod event_handler;
mod event_queue;
mod seed_client;
mod session_link;
mod worker_pool;

pub use event_handler::{CapsEventHandler, HandlerError, PacketHandler};
pub use event_queue::{EventQueueTransport, PollError, PollRequest, PollResponse};
pub use seed_client::{SeedClient, SeedError};
pub use session_link::SessionLink;
pub use worker_pool::{Task, WorkerPool};
