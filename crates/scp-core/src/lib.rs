//! # scp-core
//!
//! Wire codec, session state machines, and the session registry for the
//! Simple Chat Protocol (SCP v1.0).
//!
//! This crate is transport-agnostic: it knows nothing about QUIC or TLS.
//! It is used by both the server (`scpd`) and the client (`scp-client`)
//! binaries, which own the network I/O and drive these types.

pub mod client_fsm;
pub mod codec;
pub mod config;
pub mod registry;
pub mod server_fsm;
pub mod types;
