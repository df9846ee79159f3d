//! Packet-channel messages.
//!
//! Packets are modelled by type tag and field values only; the binary
//! layout belongs to the transport. The same shapes are produced when an
//! undecodable capability event is rebuilt into a packet.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use uuid::Uuid;

/// Packet type tags. `Default` is the wildcard key in dispatch tables and
/// never names a real packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Default,
    PacketAck,
    StartPingCheck,
    CompletePingCheck,
    ChatFromSimulator,
    ImprovedInstantMessage,
    EnableSimulator,
    DisableSimulator,
    AgentMovementComplete,
    TeleportProgress,
}

impl PacketType {
    pub const ALL: [PacketType; 10] = [
        PacketType::Default,
        PacketType::PacketAck,
        PacketType::StartPingCheck,
        PacketType::CompletePingCheck,
        PacketType::ChatFromSimulator,
        PacketType::ImprovedInstantMessage,
        PacketType::EnableSimulator,
        PacketType::DisableSimulator,
        PacketType::AgentMovementComplete,
        PacketType::TeleportProgress,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PacketType::Default => "Default",
            PacketType::PacketAck => "PacketAck",
            PacketType::StartPingCheck => "StartPingCheck",
            PacketType::CompletePingCheck => "CompletePingCheck",
            PacketType::ChatFromSimulator => "ChatFromSimulator",
            PacketType::ImprovedInstantMessage => "ImprovedInstantMessage",
            PacketType::EnableSimulator => "EnableSimulator",
            PacketType::DisableSimulator => "DisableSimulator",
            PacketType::AgentMovementComplete => "AgentMovementComplete",
            PacketType::TeleportProgress => "TeleportProgress",
        }
    }

    /// Looks a packet type up by its wire name.
    pub fn from_name(name: &str) -> Option<PacketType> {
        PACKET_TYPES_BY_NAME.get(name).copied()
    }

    /// Types that routinely arrive with nobody listening and are not worth
    /// a "no handler" log line.
    pub fn is_silently_unhandled(&self) -> bool {
        matches!(self, PacketType::Default | PacketType::PacketAck)
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static PACKET_TYPES_BY_NAME: Lazy<HashMap<&'static str, PacketType>> = Lazy::new(|| {
    PacketType::ALL
        .iter()
        .map(|packet_type| (packet_type.name(), *packet_type))
        .collect()
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PacketAck {
    #[serde(rename = "ID", default)]
    pub ids: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartPingCheck {
    #[serde(rename = "PingID")]
    pub ping_id: u8,
    #[serde(default)]
    pub oldest_unacked: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompletePingCheck {
    #[serde(rename = "PingID")]
    pub ping_id: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChatFromSimulator {
    pub from_name: String,
    #[serde(rename = "SourceID")]
    pub source_id: Uuid,
    #[serde(rename = "OwnerID", default)]
    pub owner_id: Uuid,
    #[serde(default)]
    pub source_type: u8,
    #[serde(default)]
    pub chat_type: u8,
    #[serde(default)]
    pub audible: u8,
    #[serde(default)]
    pub position: [f32; 3],
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImprovedInstantMessage {
    #[serde(rename = "FromAgentID")]
    pub from_agent_id: Uuid,
    #[serde(rename = "ToAgentID")]
    pub to_agent_id: Uuid,
    #[serde(rename = "ID", default)]
    pub id: Uuid,
    #[serde(default)]
    pub dialog: u8,
    pub from_agent_name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnableSimulator {
    pub handle: u64,
    #[serde(rename = "IP")]
    pub ip: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisableSimulator {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentMovementComplete {
    #[serde(rename = "AgentID")]
    pub agent_id: Uuid,
    pub position: [f32; 3],
    #[serde(default)]
    pub look_at: [f32; 3],
    pub region_handle: u64,
    #[serde(default)]
    pub timestamp: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TeleportProgress {
    #[serde(rename = "AgentID")]
    pub agent_id: Uuid,
    #[serde(default)]
    pub teleport_flags: u32,
    pub message: String,
}

/// A packet with its decoded field values.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    PacketAck(PacketAck),
    StartPingCheck(StartPingCheck),
    CompletePingCheck(CompletePingCheck),
    ChatFromSimulator(ChatFromSimulator),
    ImprovedInstantMessage(ImprovedInstantMessage),
    EnableSimulator(EnableSimulator),
    DisableSimulator(DisableSimulator),
    AgentMovementComplete(AgentMovementComplete),
    TeleportProgress(TeleportProgress),
}

/// Why a structured body could not be rebuilt into a packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconstructError {
    #[error("no packet type named '{0}'")]
    UnknownType(String),

    #[error("packet type {0} cannot be built from a structured body")]
    NotReconstructible(PacketType),

    #[error("body does not match {packet_type} fields: {reason}")]
    Fields {
        packet_type: PacketType,
        reason: String,
    },
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::PacketAck(_) => PacketType::PacketAck,
            Packet::StartPingCheck(_) => PacketType::StartPingCheck,
            Packet::CompletePingCheck(_) => PacketType::CompletePingCheck,
            Packet::ChatFromSimulator(_) => PacketType::ChatFromSimulator,
            Packet::ImprovedInstantMessage(_) => PacketType::ImprovedInstantMessage,
            Packet::EnableSimulator(_) => PacketType::EnableSimulator,
            Packet::DisableSimulator(_) => PacketType::DisableSimulator,
            Packet::AgentMovementComplete(_) => PacketType::AgentMovementComplete,
            Packet::TeleportProgress(_) => PacketType::TeleportProgress,
        }
    }

    /// Rebuilds a packet from an event name and a structured body.
    ///
    /// The name selects the packet type; the body must carry that packet's
    /// fields. Unknown keys are ignored.
    pub fn from_structured(
        name: &str,
        body: &Map<String, JsonValue>,
    ) -> Result<Packet, ReconstructError> {
        let packet_type = PacketType::from_name(name)
            .ok_or_else(|| ReconstructError::UnknownType(name.to_string()))?;

        let packet = match packet_type {
            PacketType::Default => return Err(ReconstructError::NotReconstructible(packet_type)),
            PacketType::PacketAck => Packet::PacketAck(fields(packet_type, body)?),
            PacketType::StartPingCheck => Packet::StartPingCheck(fields(packet_type, body)?),
            PacketType::CompletePingCheck => Packet::CompletePingCheck(fields(packet_type, body)?),
            PacketType::ChatFromSimulator => Packet::ChatFromSimulator(fields(packet_type, body)?),
            PacketType::ImprovedInstantMessage => {
                Packet::ImprovedInstantMessage(fields(packet_type, body)?)
            }
            PacketType::EnableSimulator => Packet::EnableSimulator(fields(packet_type, body)?),
            PacketType::DisableSimulator => Packet::DisableSimulator(fields(packet_type, body)?),
            PacketType::AgentMovementComplete => {
                Packet::AgentMovementComplete(fields(packet_type, body)?)
            }
            PacketType::TeleportProgress => Packet::TeleportProgress(fields(packet_type, body)?),
        };

        Ok(packet)
    }
}

fn fields<T: DeserializeOwned>(
    packet_type: PacketType,
    body: &Map<String, JsonValue>,
) -> Result<T, ReconstructError> {
    serde_json::from_value(JsonValue::Object(body.clone())).map_err(|e| ReconstructError::Fields {
        packet_type,
        reason: e.to_string(),
    })
}
