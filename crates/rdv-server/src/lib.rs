//! rdv-server: TLS shell listener with tmux rendezvous
//!
//! The listener role accepts agent callbacks over TLS, opens a tmux window
//! for each one, and relays the connection to a bridge process that the
//! window runs. The bridge role binds a one-shot Unix socket and wires the
//! relayed stream to the operator's terminal.

pub mod bridge;
pub mod connection;
pub mod relay;
pub mod rendezvous;
pub mod server;
pub mod session;
pub mod state;

pub use rendezvous::RendezvousPath;
pub use state::ServerState;
