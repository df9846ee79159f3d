//! EventQueueTransport port - one round trip of the long-poll channel.
//!
//! The event stream drives this port in a loop; the transport only has to
//! carry a single request and its response.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use url::Url;

use crate::domain::messages::CapsEvent;

/// Body of a poll request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollRequest {
    /// Id of the last response received, acknowledging its events.
    pub ack: Option<i64>,
    /// True on the final request of a graceful shutdown.
    pub done: bool,
}

impl PollRequest {
    pub fn next(ack: Option<i64>) -> Self {
        Self { ack, done: false }
    }

    pub fn closing(ack: Option<i64>) -> Self {
        Self { ack, done: true }
    }
}

/// Events returned by one poll.
///
/// Entries that do not parse as an event are skipped with a warning; the
/// rest of the batch and its `id` are kept.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PollResponse {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "events_skipping_malformed")]
    pub events: Vec<CapsEvent>,
}

fn events_skipping_malformed<'de, D>(deserializer: D) -> Result<Vec<CapsEvent>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<JsonValue>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping malformed event in poll batch");
                None
            }
        })
        .collect())
}

impl PollResponse {
    /// A poll that completed without events, e.g. a server-side hold timeout.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Errors from a single poll.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    /// The event queue no longer exists (HTTP 404).
    #[error("event queue not found")]
    NotFound,

    #[error("poll failed with HTTP {status}")]
    Http { status: u16 },

    #[error("poll timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed poll response: {0}")]
    Malformed(String),
}

impl PollError {
    /// True if polling again cannot succeed.
    pub fn is_queue_gone(&self) -> bool {
        matches!(self, PollError::NotFound)
    }
}

/// Port for the event-queue capability.
#[async_trait]
pub trait EventQueueTransport: Send + Sync {
    /// Issues one poll and waits for the server to answer it.
    ///
    /// May stay pending for as long as the server holds the request.
    async fn poll(&self, uri: &Url, request: PollRequest) -> Result<PollResponse, PollError>;
}
