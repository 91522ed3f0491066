//! rdv-protocol: Agent handshake for the rendezvous listener
//!
//! An agent opens a TLS connection and, before any shell traffic, sends two
//! newline-terminated lines: its hostname, then its username. This crate
//! reads and normalizes that handshake.

pub mod error;
pub mod handshake;
pub mod identity;

pub use error::{HandshakeError, HandshakeField};
pub use handshake::{read_identity, HandshakeLimits, DEFAULT_MAX_LINE, DEFAULT_TIMEOUT};
pub use identity::{sanitize, AgentIdentity};
