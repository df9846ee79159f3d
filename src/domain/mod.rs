//! Domain layer containing protocol types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (session ids, validation errors, state machine trait)
//! - `capabilities` - Capability catalog, granted capability table, negotiator lifecycle
//! - `messages` - Capability events, decoded messages and packets

pub mod capabilities;
pub mod foundation;
pub mod messages;
