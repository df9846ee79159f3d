//! EventDecoder - name to typed-message lookup for capability events.
//!
//! Each entry turns a JSON body into one `DecodedMessage` variant. The
//! table is built once when the client is assembled and is read-only
//! afterwards.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::domain::messages::DecodedMessage;

/// Builds one message variant from an event body.
pub type DecodeFn = fn(&JsonValue) -> Result<DecodedMessage, serde_json::Error>;

/// Registry of event decoders keyed by event name.
#[derive(Clone, Default)]
pub struct EventDecoder {
    decoders: HashMap<String, DecodeFn>,
}

impl EventDecoder {
    /// An empty registry; every event falls through to reconstruction.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with every message this client understands.
    pub fn with_defaults() -> Self {
        let mut decoder = Self::new();
        decoder.register("EstablishAgentCommunication", |body| {
            parse(body).map(DecodedMessage::EstablishAgentCommunication)
        });
        decoder.register("TeleportFinish", |body| {
            parse(body).map(DecodedMessage::TeleportFinish)
        });
        decoder.register("CrossedRegion", |body| {
            parse(body).map(DecodedMessage::CrossedRegion)
        });
        decoder.register("ChatterBoxInvitation", |body| {
            parse(body).map(DecodedMessage::ChatterBoxInvitation)
        });
        decoder.register("ChatterBoxSessionStartReply", |body| {
            parse(body).map(DecodedMessage::ChatterBoxSessionStartReply)
        });
        decoder.register("AgentGroupDataUpdate", |body| {
            parse(body).map(DecodedMessage::AgentGroupDataUpdate)
        });
        decoder
    }

    /// Adds or replaces the decoder for `event_name`.
    pub fn register(&mut self, event_name: impl Into<String>, decode: DecodeFn) {
        self.decoders.insert(event_name.into(), decode);
    }

    pub fn knows(&self, event_name: &str) -> bool {
        self.decoders.contains_key(event_name)
    }

    /// Decodes an event body.
    ///
    /// `None` for names without a decoder and for bodies the decoder
    /// rejects; either way the caller may still try packet reconstruction.
    pub fn decode(&self, event_name: &str, body: &JsonValue) -> Option<DecodedMessage> {
        let decode = self.decoders.get(event_name)?;
        match decode(body) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::debug!(event = event_name, error = %e, "Event body rejected by decoder");
                None
            }
        }
    }
}

fn parse<T: DeserializeOwned>(body: &JsonValue) -> Result<T, serde_json::Error> {
    T::deserialize(body)
}
