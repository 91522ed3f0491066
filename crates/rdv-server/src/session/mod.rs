//! Session routing
//!
//! Maps an agent's host to a tmux session and each callback to a new
//! window in it, then launches the bridge process in that window.

mod manager;
mod router;
mod tmux;

pub use manager::{SessionHandle, SessionManager};
pub use router::{BridgeCommand, Route, SessionRouter, BELL_COMMAND};
pub use tmux::TmuxMultiplexer;
