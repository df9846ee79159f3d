//! Application layer - capability negotiation and event dispatch.
//!
//! This layer coordinates the ports: it drives the seed request and the
//! long-poll stream, turns raw events into typed messages and fans them
//! out to registered handlers.
//!
//! ```text
//! SeedClient ──> CapabilityNegotiator ──> EventStream ──> CapsEventRouter
//!                                                           │        │
//!                                            CapsDispatchTable   PacketQueue
//!                                                                    │
//! binary transport ───────────────────────────────────────────> PacketPump
//!                                                                    │
//!                                                           PacketDispatchTable
//! ```

pub mod decoder;
pub mod dispatch;
pub mod event_stream;
pub mod inbound;
pub mod negotiator;
pub mod router;

pub use decoder::{DecodeFn, EventDecoder};
pub use dispatch::{CapsDispatchTable, PacketDispatchTable, WILDCARD};
pub use event_stream::{EventStream, EventStreamListener, StopReason};
pub use inbound::{PacketPump, PacketQueue, PacketReceiver};
pub use negotiator::{CapabilityNegotiator, NegotiatorOptions, RetryPolicy};
pub use router::{CapsEventRouter, RouteOutcome};
