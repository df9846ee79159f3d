//! The fixed list of capabilities this client knows how to use.

/// Capability that hosts the long-poll event queue.
pub const EVENT_QUEUE_GET: &str = "EventQueueGet";

/// Bumped whenever [`CAPABILITY_CATALOG`] changes.
pub const CATALOG_REVISION: u32 = 3;

/// Every capability name sent in the seed request.
pub const CAPABILITY_CATALOG: &[&str] = &[
    "AttachmentResources",
    "AvatarPickerSearch",
    "ChatSessionRequest",
    "CopyInventoryFromNotecard",
    "CreateInventoryCategory",
    "DispatchRegionInfo",
    "EnvironmentSettings",
    EVENT_QUEUE_GET,
    "FetchInventory2",
    "FetchInventoryDescendents2",
    "FetchLib2",
    "FetchLibDescendents2",
    "GetDisplayNames",
    "GetMesh",
    "GetTexture",
    "GroupProposalBallot",
    "HomeLocation",
    "MapLayer",
    "MapLayerGod",
    "NewFileAgentInventory",
    "ObjectMedia",
    "ObjectMediaNavigate",
    "ParcelPropertiesUpdate",
    "ParcelVoiceInfoRequest",
    "ProvisionVoiceAccountRequest",
    "RemoteParcelRequest",
    "SearchStatRequest",
    "SearchStatTracking",
    "SendPostcard",
    "SendUserReport",
    "SendUserReportWithScreenshot",
    "ServerReleaseNotes",
    "SetDisplayName",
    "SimulatorFeatures",
    "StartGroupProposal",
    "UntrustedSimulatorMessage",
    "UpdateAgentInformation",
    "UpdateAgentLanguage",
    "UpdateGestureAgentInventory",
    "UpdateGestureTaskInventory",
    "UpdateNotecardAgentInventory",
    "UpdateNotecardTaskInventory",
    "UpdateScriptAgent",
    "UpdateScriptTask",
    "UploadBakedTexture",
    "UploadObjectAsset",
    "ViewerStartAuction",
    "ViewerStats",
];

/// The body of a seed request: the names the client asks the server to grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedRequest {
    revision: u32,
    names: Vec<&'static str>,
}

impl SeedRequest {
    /// Builds the request for the full catalog.
    pub fn standard() -> Self {
        Self {
            revision: CATALOG_REVISION,
            names: CAPABILITY_CATALOG.to_vec(),
        }
    }

    /// Catalog revision this request was built from.
    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// Capability names, in catalog order.
    pub fn names(&self) -> &[&'static str] {
        &self.names
    }
}
