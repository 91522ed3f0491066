//! TLS listener for agent callbacks

mod handler;
mod listener;
mod tls;

pub use handler::{ConnectionHandler, ConnectionState};
pub use listener::RendezvousServer;
pub use tls::{certificate_fingerprint, load_tls_identity, TlsIdentity};
