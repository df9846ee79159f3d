//! Raw events as they come off the long-poll channel.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One `(name, body)` pair delivered by the event queue.
///
/// The server names the event under `message`; `event_name` is accepted too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapsEvent {
    #[serde(rename = "message", alias = "event_name")]
    pub name: String,

    #[serde(default)]
    pub body: JsonValue,
}

impl CapsEvent {
    /// Creates an event.
    pub fn new(name: impl Into<String>, body: JsonValue) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}
