//! Packet-channel dispatch table.
//!
//! Handlers are keyed by packet type, with `PacketType::Default` as the
//! wildcard. Each key carries one execution mode: if any registration for
//! it asked for asynchronous delivery, the whole chain is delivered on the
//! worker pool from then on. The flag only resets when the key itself is
//! removed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::foundation::SessionId;
use crate::domain::messages::{InboundPacket, Packet, PacketType};
use crate::ports::{PacketHandler, WorkerPool};

use super::invoke::{invoke_isolated, Channel};
use super::same_handler;

#[derive(Clone, Default)]
struct PacketChain {
    handlers: Vec<Arc<dyn PacketHandler>>,
    run_async: bool,
}

/// Registry of packet handlers.
///
/// Synchronous chains run on the caller's thread, normally the packet
/// receive loop, so a slow handler holds up the packets behind it.
pub struct PacketDispatchTable {
    chains: Mutex<HashMap<PacketType, PacketChain>>,
    pool: Arc<dyn WorkerPool>,
    force_sync: bool,
}

impl PacketDispatchTable {
    /// Creates a table that offloads asynchronous chains to `pool`.
    pub fn new(pool: Arc<dyn WorkerPool>) -> Self {
        Self {
            chains: Mutex::new(HashMap::new()),
            pool,
            force_sync: false,
        }
    }

    /// When set, every chain runs inline whatever its async flag says.
    pub fn with_force_sync(mut self, force_sync: bool) -> Self {
        self.force_sync = force_sync;
        self
    }

    /// Appends `handler` to the chain for `packet_type`.
    ///
    /// `run_async = true` switches the whole chain to pool delivery.
    pub fn register(&self, packet_type: PacketType, handler: Arc<dyn PacketHandler>, run_async: bool) {
        let mut chains = self.chains.lock();
        let chain = chains.entry(packet_type).or_default();
        chain.handlers.push(handler);
        chain.run_async |= run_async;
    }

    /// Removes one registration of `handler` for `packet_type`.
    ///
    /// The key, async flag included, disappears with its last handler.
    pub fn unregister(&self, packet_type: PacketType, handler: &Arc<dyn PacketHandler>) -> bool {
        let mut chains = self.chains.lock();
        let Some(chain) = chains.get_mut(&packet_type) else {
            return false;
        };
        let Some(index) = chain.handlers.iter().rposition(|h| same_handler(h, handler)) else {
            return false;
        };
        chain.handlers.remove(index);
        if chain.handlers.is_empty() {
            chains.remove(&packet_type);
        }
        true
    }

    pub fn is_registered(&self, packet_type: PacketType) -> bool {
        self.chains.lock().contains_key(&packet_type)
    }

    pub fn handler_count(&self, packet_type: PacketType) -> usize {
        self.chains
            .lock()
            .get(&packet_type)
            .map_or(0, |chain| chain.handlers.len())
    }

    /// Whether deliveries for `packet_type` go to the pool, if registered.
    pub fn is_async(&self, packet_type: PacketType) -> Option<bool> {
        self.chains
            .lock()
            .get(&packet_type)
            .map(|chain| chain.run_async && !self.force_sync)
    }

    /// Delivers a packet: the default chain first, then the chain for
    /// `packet_type`, each in its own execution mode.
    ///
    /// Returns true if at least one chain received the packet.
    pub fn raise(&self, packet_type: PacketType, packet: Arc<Packet>, origin: SessionId) -> bool {
        let (default, exact) = {
            let chains = self.chains.lock();
            let default = chains.get(&PacketType::Default).cloned();
            let exact = if packet_type == PacketType::Default {
                None
            } else {
                chains.get(&packet_type).cloned()
            };
            (default, exact)
        };

        let mut delivered = false;
        if let Some(chain) = default {
            self.deliver(packet_type, chain, Arc::clone(&packet), origin);
            delivered = true;
        }
        match exact {
            Some(chain) => {
                self.deliver(packet_type, chain, packet, origin);
                delivered = true;
            }
            None if !packet_type.is_silently_unhandled() => {
                tracing::debug!(packet_type = %packet_type, session_id = %origin, "No handler registered for packet");
            }
            None => {}
        }
        delivered
    }

    /// Delivers a queued packet under its own type.
    pub fn raise_inbound(&self, inbound: InboundPacket) -> bool {
        let packet_type = inbound.packet_type();
        self.raise(packet_type, inbound.packet, inbound.origin)
    }

    fn deliver(&self, packet_type: PacketType, chain: PacketChain, packet: Arc<Packet>, origin: SessionId) {
        if chain.run_async && !self.force_sync {
            self.pool.submit(Box::new(move || {
                run_chain(packet_type, &chain.handlers, &packet, origin);
            }));
        } else {
            run_chain(packet_type, &chain.handlers, &packet, origin);
        }
    }
}

fn run_chain(
    packet_type: PacketType,
    handlers: &[Arc<dyn PacketHandler>],
    packet: &Packet,
    origin: SessionId,
) {
    for handler in handlers {
        invoke_isolated(Channel::Packet, packet_type.name(), handler.name(), || {
            handler.handle(packet, origin)
        });
    }
}
