//! SessionLink port - what the capability layer needs from its session.

use crate::domain::foundation::SessionId;

/// The owning network session, as seen by capability negotiation.
///
/// The session owns the negotiator; the negotiator only reads connection
/// status and reports back when the capability channel comes up.
pub trait SessionLink: Send + Sync {
    /// Identifier used to tag everything this session delivers.
    fn session_id(&self) -> SessionId;

    /// True while the packet channel to the simulator is up.
    fn is_connected(&self) -> bool;

    /// Called once per event stream when its first poll completes.
    fn event_queue_connected(&self);
}
