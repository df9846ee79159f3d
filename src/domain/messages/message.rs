//! Typed payloads for events delivered over the capability channel.
//!
//! Only the messages this client acts on are modelled. Anything else falls
//! through to packet reconstruction or is dropped.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sent by a neighbouring simulator once the agent may talk to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstablishAgentCommunication {
    #[serde(rename = "agent-id")]
    pub agent_id: Uuid,
    #[serde(rename = "seed-capability")]
    pub seed_capability: String,
    #[serde(rename = "sim-ip-and-port")]
    pub sim_ip_and_port: String,
}

/// Completion of a teleport; carries the destination's seed capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TeleportFinish {
    #[serde(rename = "AgentID")]
    pub agent_id: Uuid,
    #[serde(rename = "LocationID")]
    pub location_id: u32,
    #[serde(rename = "SimIP")]
    pub sim_ip: String,
    pub sim_port: u16,
    pub region_handle: u64,
    pub seed_capability: String,
    #[serde(default)]
    pub teleport_flags: u32,
}

/// The agent walked or flew into a neighbouring region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CrossedRegion {
    #[serde(rename = "AgentID")]
    pub agent_id: Uuid,
    #[serde(rename = "SessionID")]
    pub session_id: Uuid,
    pub region_handle: u64,
    pub seed_capability: String,
    #[serde(rename = "SimIP")]
    pub sim_ip: String,
    pub sim_port: u16,
}

/// Invitation into a group or conference chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatterBoxInvitation {
    pub session_id: Uuid,
    pub from_agent_id: Uuid,
    pub from_agent_name: String,
    #[serde(default)]
    pub message: String,
}

/// Reply to a chat session start request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatterBoxSessionStartReply {
    pub session_id: Uuid,
    pub temp_session_id: Uuid,
    pub success: bool,
    #[serde(default)]
    pub session_name: String,
}

/// One group the agent belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupMembership {
    #[serde(rename = "GroupID")]
    pub group_id: Uuid,
    pub group_name: String,
    #[serde(default)]
    pub accept_notices: bool,
    #[serde(default)]
    pub contribution: i32,
}

/// Full list of the agent's group memberships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentGroupDataUpdate {
    #[serde(rename = "AgentID")]
    pub agent_id: Uuid,
    #[serde(default)]
    pub group_data: Vec<GroupMembership>,
}

/// A capability-channel event decoded into its typed shape.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    EstablishAgentCommunication(EstablishAgentCommunication),
    TeleportFinish(TeleportFinish),
    CrossedRegion(CrossedRegion),
    ChatterBoxInvitation(ChatterBoxInvitation),
    ChatterBoxSessionStartReply(ChatterBoxSessionStartReply),
    AgentGroupDataUpdate(AgentGroupDataUpdate),
}

impl DecodedMessage {
    /// Wire name of the message.
    pub fn name(&self) -> &'static str {
        match self {
            DecodedMessage::EstablishAgentCommunication(_) => "EstablishAgentCommunication",
            DecodedMessage::TeleportFinish(_) => "TeleportFinish",
            DecodedMessage::CrossedRegion(_) => "CrossedRegion",
            DecodedMessage::ChatterBoxInvitation(_) => "ChatterBoxInvitation",
            DecodedMessage::ChatterBoxSessionStartReply(_) => "ChatterBoxSessionStartReply",
            DecodedMessage::AgentGroupDataUpdate(_) => "AgentGroupDataUpdate",
        }
    }
}
