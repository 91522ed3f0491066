//! Shared listener state

use std::sync::Arc;

use rdv_core::config::ListenerConfig;
use rdv_core::traits::Multiplexer;

use crate::session::{BridgeCommand, SessionManager, SessionRouter};

/// State shared by every connection handled by the listener
pub struct ServerState {
    /// Configuration
    pub config: ListenerConfig,
    /// Session cache
    pub sessions: Arc<SessionManager>,
    /// Session router
    pub router: SessionRouter,
}

impl ServerState {
    /// Create listener state around a multiplexer
    pub fn new(config: ListenerConfig, mux: Arc<dyn Multiplexer>, bridge: BridgeCommand) -> Self {
        let sessions = Arc::new(SessionManager::new());
        let router = SessionRouter::new(
            mux,
            Arc::clone(&sessions),
            config.state_dir.clone(),
            bridge,
        );

        Self {
            config,
            sessions,
            router,
        }
    }
}
