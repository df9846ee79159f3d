//! Gridlink - capability negotiation and event dispatch for virtual-world
//! client sessions.
//!
//! A session receives server events over two channels: the binary packet
//! channel and the HTTP long-poll capability channel. This crate discovers
//! the session's capabilities, keeps the long-poll event stream alive and
//! fans events from both channels out to registered handlers.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
