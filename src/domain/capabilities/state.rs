//! Lifecycle of capability negotiation for one session.

use std::fmt;

use crate::domain::foundation::StateMachine;

/// Where the capability negotiator is in its lifecycle.
///
/// ```text
/// Disconnected --start--> AwaitingSeedResponse
/// AwaitingSeedResponse --seed ok--> Active { event_stream_running }
/// AwaitingSeedResponse --not found--> Terminated
/// AwaitingSeedResponse / Active --disconnect--> Disconnected
/// Active { true } --queue gone--> Active { false }
/// ```
///
/// Transient seed failures keep the negotiator in `AwaitingSeedResponse`
/// while the request is re-issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegotiatorState {
    #[default]
    Disconnected,
    AwaitingSeedResponse,
    Active {
        event_stream_running: bool,
    },
    Terminated,
}

impl NegotiatorState {
    /// True once a seed response has been applied.
    pub fn is_active(&self) -> bool {
        matches!(self, NegotiatorState::Active { .. })
    }

    /// True while the event stream is believed to be polling.
    pub fn is_event_stream_running(&self) -> bool {
        matches!(
            self,
            NegotiatorState::Active {
                event_stream_running: true
            }
        )
    }
}

impl StateMachine for NegotiatorState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use NegotiatorState::*;
        matches!(
            (self, target),
            (Disconnected, AwaitingSeedResponse)
                | (AwaitingSeedResponse, Active { .. })
                | (AwaitingSeedResponse, Terminated)
                | (AwaitingSeedResponse, Disconnected)
                | (
                    Active {
                        event_stream_running: true
                    },
                    Active {
                        event_stream_running: false
                    }
                )
                | (Active { .. }, Disconnected)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use NegotiatorState::*;
        match self {
            Disconnected => vec![AwaitingSeedResponse],
            AwaitingSeedResponse => vec![
                Active {
                    event_stream_running: true,
                },
                Active {
                    event_stream_running: false,
                },
                Terminated,
                Disconnected,
            ],
            Active {
                event_stream_running: true,
            } => vec![
                Active {
                    event_stream_running: false,
                },
                Disconnected,
            ],
            Active {
                event_stream_running: false,
            } => vec![Disconnected],
            Terminated => vec![],
        }
    }
}

impl fmt::Display for NegotiatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiatorState::Disconnected => write!(f, "disconnected"),
            NegotiatorState::AwaitingSeedResponse => write!(f, "awaiting_seed_response"),
            NegotiatorState::Active {
                event_stream_running: true,
            } => write!(f, "active(event_stream)"),
            NegotiatorState::Active {
                event_stream_running: false,
            } => write!(f, "active"),
            NegotiatorState::Terminated => write!(f, "terminated"),
        }
    }
}
