//! TLS listener
//!
//! Accepts agent connections and spawns a handler task for each one. The
//! TLS handshake runs inside the task so a slow client never blocks accept.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

use crate::server::handler::ConnectionHandler;
use crate::state::ServerState;

/// Listener for agent callbacks
pub struct RendezvousServer {
    /// TLS acceptor
    acceptor: TlsAcceptor,
    /// Shared listener state
    state: Arc<ServerState>,
    /// Cancellation token for graceful shutdown
    cancel: CancellationToken,
}

impl RendezvousServer {
    /// Create a new server
    pub fn new(acceptor: TlsAcceptor, state: Arc<ServerState>, cancel: CancellationToken) -> Self {
        Self {
            acceptor,
            state,
            cancel,
        }
    }

    /// Bind `bind_addr` and serve until cancelled
    pub async fn run(&self, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", bind_addr))?;

        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until cancelled
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!("Listening on {}", local_addr);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Listener shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => self.handle_connection(socket, peer_addr),
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        tracing::info!("New connection from {}", peer_addr);

        let acceptor = self.acceptor.clone();
        let state = Arc::clone(&self.state);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let tls = tokio::select! {
                _ = cancel.cancelled() => return,
                result = acceptor.accept(socket) => match result {
                    Ok(tls) => tls,
                    Err(e) => {
                        tracing::warn!("TLS handshake with {} failed: {}", peer_addr, e);
                        return;
                    }
                }
            };

            let handler = ConnectionHandler::new(state, peer_addr);
            let state = handler.run(tls).await;
            tracing::debug!("Connection from {} finished: {}", peer_addr, state);
        });
    }
}
