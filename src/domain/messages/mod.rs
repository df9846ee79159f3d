//! Messages module - what travels over the two inbound channels.
//!
//! - `CapsEvent` - raw `(name, body)` pair from the event queue
//! - `DecodedMessage` - typed capability-channel payloads
//! - `Packet` / `PacketType` - packet-channel messages
//! - `InboundPacket` - packet tagged with its originating session

mod event;
mod inbound;
mod message;
mod packet;

pub use event::CapsEvent;
pub use inbound::InboundPacket;
pub use message::{
    AgentGroupDataUpdate, ChatterBoxInvitation, ChatterBoxSessionStartReply, CrossedRegion,
    DecodedMessage, EstablishAgentCommunication, GroupMembership, TeleportFinish,
};
pub use packet::{
    AgentMovementComplete, ChatFromSimulator, CompletePingCheck, DisableSimulator,
    EnableSimulator, ImprovedInstantMessage, Packet, PacketAck, PacketType, ReconstructError,
    StartPingCheck, TeleportProgress,
};
