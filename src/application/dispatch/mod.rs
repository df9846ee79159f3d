//! Dispatch tables for the two inbound channels.
//!
//! - `CapsDispatchTable` - capability events, keyed by event name
//! - `PacketDispatchTable` - packets, keyed by packet type, with a
//!   per-key synchronous/asynchronous execution mode
//!
//! Both tables deliver the wildcard chain first and isolate every handler
//! from its siblings' failures.

mod caps_table;
pub(crate) mod invoke;
mod packet_table;

use std::sync::Arc;

pub use caps_table::{CapsDispatchTable, WILDCARD};
pub use packet_table::PacketDispatchTable;

/// Handler identity is the allocation, not the value.
pub(crate) fn same_handler<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}
