//! Routing of capability events into the dispatch paths.
//!
//! A decoded event goes to the capability dispatch table. An undecodable
//! event with a structured body is rebuilt into a packet and joins the
//! binary channel's traffic on the inbound packet queue. Anything else is
//! dropped with a warning.

use std::sync::Arc;

use crate::domain::foundation::SessionId;
use crate::domain::messages::{CapsEvent, InboundPacket, Packet};

use super::decoder::EventDecoder;
use super::dispatch::CapsDispatchTable;
use super::inbound::PacketQueue;

/// Where an event ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Decoded and handed to the capability dispatch table.
    Dispatched,
    /// Rebuilt into a packet and queued.
    Reconstructed,
    Dropped,
}

pub struct CapsEventRouter {
    decoder: EventDecoder,
    caps_table: Arc<CapsDispatchTable>,
    packets: PacketQueue,
}

impl CapsEventRouter {
    pub fn new(decoder: EventDecoder, caps_table: Arc<CapsDispatchTable>, packets: PacketQueue) -> Self {
        Self {
            decoder,
            caps_table,
            packets,
        }
    }

    /// Routes one event received on behalf of `origin`.
    pub fn route(&self, event: CapsEvent, origin: SessionId) -> RouteOutcome {
        if let Some(message) = self.decoder.decode(&event.name, &event.body) {
            self.caps_table
                .begin_raise(&event.name, Arc::new(message), origin);
            return RouteOutcome::Dispatched;
        }

        let Some(body) = event.body.as_object() else {
            tracing::warn!(event = %event.name, session_id = %origin, "Dropping undecodable event without structured body");
            return RouteOutcome::Dropped;
        };

        match Packet::from_structured(&event.name, body) {
            Ok(packet) => {
                if self.packets.push(InboundPacket::new(origin, packet)) {
                    tracing::debug!(event = %event.name, session_id = %origin, "Event rebuilt as packet");
                    RouteOutcome::Reconstructed
                } else {
                    tracing::warn!(event = %event.name, session_id = %origin, "Packet queue closed, dropping rebuilt event");
                    RouteOutcome::Dropped
                }
            }
            Err(e) => {
                tracing::warn!(event = %event.name, session_id = %origin, error = %e, "Dropping undecodable event");
                RouteOutcome::Dropped
            }
        }
    }
}
