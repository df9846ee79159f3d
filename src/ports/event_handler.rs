//! Handler ports - callbacks registered with the dispatch tables.
//!
//! Handlers run on whatever thread delivers them: the channel's receive
//! loop for synchronous delivery, a pool worker otherwise. Implementations
//! should be:
//! - **Quick** - a slow handler stalls its channel when run inline
//! - **Isolated** - a failure is logged and never reaches sibling handlers
//!
//! Closures with the matching signature implement both traits.

use thiserror::Error;

use crate::domain::foundation::SessionId;
use crate::domain::messages::{DecodedMessage, Packet};

/// Failure reported by a handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Handler for decoded capability-channel events.
///
/// # Example
///
/// ```ignore
/// struct TeleportWatcher;
///
/// impl CapsEventHandler for TeleportWatcher {
///     fn handle(&self, _: &str, message: &DecodedMessage, origin: SessionId) -> Result<(), HandlerError> {
///         if let DecodedMessage::TeleportFinish(finish) = message {
///             tracing::info!(%origin, seed = %finish.seed_capability, "teleport finished");
///         }
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "TeleportWatcher"
///     }
/// }
/// ```
pub trait CapsEventHandler: Send + Sync {
    fn handle(
        &self,
        event_name: &str,
        message: &DecodedMessage,
        origin: SessionId,
    ) -> Result<(), HandlerError>;

    /// Name used in failure logs.
    fn name(&self) -> &str {
        "anonymous"
    }
}

impl<F> CapsEventHandler for F
where
    F: Fn(&str, &DecodedMessage, SessionId) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(
        &self,
        event_name: &str,
        message: &DecodedMessage,
        origin: SessionId,
    ) -> Result<(), HandlerError> {
        self(event_name, message, origin)
    }
}

/// Handler for packet-channel traffic.
pub trait PacketHandler: Send + Sync {
    fn handle(&self, packet: &Packet, origin: SessionId) -> Result<(), HandlerError>;

    /// Name used in failure logs.
    fn name(&self) -> &str {
        "anonymous"
    }
}

impl<F> PacketHandler for F
where
    F: Fn(&Packet, SessionId) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, packet: &Packet, origin: SessionId) -> Result<(), HandlerError> {
        self(packet, origin)
    }
}
