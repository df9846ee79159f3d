//! SeedClient port - Interface for the seed capability request.
//!
//! The seed request trades the client's capability catalog for the
//! session-scoped endpoints the server is willing to grant.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

use crate::domain::capabilities::SeedRequest;

/// Errors from a seed request.
///
/// Only [`SeedError::NotFound`] is final; everything else is worth another
/// attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeedError {
    /// The seed capability does not exist (HTTP 404).
    #[error("seed capability not found")]
    NotFound,

    /// Any other non-success HTTP status.
    #[error("seed request failed with HTTP {status}")]
    Http {
        /// Status code returned by the server.
        status: u16,
    },

    /// Request timed out.
    #[error("seed request timed out after {timeout_secs}s")]
    Timeout {
        /// Configured timeout.
        timeout_secs: u64,
    },

    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// Response was not a name to URI mapping.
    #[error("malformed seed response: {0}")]
    Malformed(String),
}

impl SeedError {
    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates a malformed response error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// True if the seed capability is permanently unavailable.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SeedError::NotFound)
    }
}

/// Port for issuing the seed request.
///
/// # Example
///
/// ```ignore
/// let granted = seed_client.request(&seed_uri, &SeedRequest::standard()).await?;
/// let event_queue = granted.get("EventQueueGet");
/// ```
#[async_trait]
pub trait SeedClient: Send + Sync {
    /// Sends the capability names and returns the granted `name -> uri`
    /// pairs exactly as the server listed them.
    async fn request(
        &self,
        seed_uri: &Url,
        request: &SeedRequest,
    ) -> Result<HashMap<String, String>, SeedError>;
}
