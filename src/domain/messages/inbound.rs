//! Envelope for packets waiting to be dispatched.

use std::sync::Arc;

use crate::domain::foundation::SessionId;

use super::{Packet, PacketType};

/// A packet and the session it came from.
///
/// Produced by the binary transport or by the capability-channel fallback;
/// consumed the same way either way.
#[derive(Debug, Clone)]
pub struct InboundPacket {
    pub origin: SessionId,
    pub packet: Arc<Packet>,
}

impl InboundPacket {
    pub fn new(origin: SessionId, packet: Packet) -> Self {
        Self {
            origin,
            packet: Arc::new(packet),
        }
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet.packet_type()
    }
}
