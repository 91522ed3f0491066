//! Per-connection handler
//!
//! Drives one agent connection from handshake to relay. Any failure before
//! the relay starts abandons the connection; nothing is sent back to the
//! agent and the listener keeps serving others.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};

use rdv_core::error::RdvError;
use rdv_protocol::read_identity;

use crate::connection::dial_bridge;
use crate::relay::relay;
use crate::state::ServerState;

/// Lifecycle of an agent connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// TLS established, nothing read yet
    Accepted,
    /// Identity lines parsed
    IdentityRead,
    /// Session and window prepared, bridge launched
    Routed,
    /// Bridge socket connected
    BridgeDialed,
    /// Bytes flowing between agent and bridge
    Relaying,
    /// Relay finished
    Closed,
    /// Dropped before the relay started
    Abandoned,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Accepted => "accepted",
            Self::IdentityRead => "identity-read",
            Self::Routed => "routed",
            Self::BridgeDialed => "bridge-dialed",
            Self::Relaying => "relaying",
            Self::Closed => "closed",
            Self::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

/// Handler for a single agent connection
pub struct ConnectionHandler {
    /// Shared listener state
    state: Arc<ServerState>,
    /// Peer address of the agent
    peer_addr: SocketAddr,
    /// Where the connection got to
    progress: ConnectionState,
}

impl ConnectionHandler {
    /// Create a handler for a freshly accepted connection
    pub fn new(state: Arc<ServerState>, peer_addr: SocketAddr) -> Self {
        Self {
            state,
            peer_addr,
            progress: ConnectionState::Accepted,
        }
    }

    /// Serve the connection to completion and return its final state
    pub async fn run<S>(mut self, stream: S) -> ConnectionState
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        match self.drive(stream).await {
            Ok(()) => ConnectionState::Closed,
            Err(e) => {
                tracing::warn!(
                    peer = %self.peer_addr,
                    state = %self.progress,
                    "abandoning connection: {}",
                    e
                );
                ConnectionState::Abandoned
            }
        }
    }

    async fn drive<S>(&mut self, stream: S) -> Result<(), RdvError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let config = &self.state.config;

        // Bytes buffered past the identity lines belong to the relay
        let mut reader = BufReader::new(stream);
        let identity = read_identity(&mut reader, config.handshake_limits()).await?;
        self.progress = ConnectionState::IdentityRead;
        tracing::debug!(peer = %self.peer_addr, agent = %identity, "identity received");

        let route = self.state.router.route(&identity).await?;
        self.progress = ConnectionState::Routed;

        let socket = match dial_bridge(route.path.as_path(), &config.dial).await {
            Ok(socket) => socket,
            Err(e) => {
                if let Err(rm) = route.path.remove() {
                    tracing::debug!("failed to remove rendezvous socket: {}", rm);
                }
                return Err(e.into());
            }
        };
        self.progress = ConnectionState::BridgeDialed;

        tracing::info!(
            peer = %self.peer_addr,
            session = %route.session,
            window = %route.window,
            "relaying"
        );
        self.progress = ConnectionState::Relaying;

        let stats = relay(reader, socket, route.path).await;
        self.progress = ConnectionState::Closed;
        tracing::info!(
            peer = %self.peer_addr,
            to_bridge = stats.a_to_b,
            to_agent = stats.b_to_a,
            first_closed = ?stats.first_closed(),
            "connection closed"
        );

        Ok(())
    }
}
