//! rdv-core: Core abstractions and configuration for rendezvous
//!
//! This crate provides the shared types, the error taxonomy, the listener
//! configuration and the terminal-multiplexer trait used by the server.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::RdvError;
pub use types::{PaneTarget, SessionName, SessionOrigin, WindowId};
