//! Terminal multiplexer abstraction
//!
//! The router only needs four operations from the multiplexer. The
//! production implementation shells out to tmux; tests substitute a
//! recording fake.

use async_trait::async_trait;

use crate::error::MultiplexerError;
use crate::types::{PaneTarget, SessionName, WindowId};

/// A window created in a session, with its primary pane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowHandle {
    /// Window identifier
    pub id: WindowId,
    /// Primary pane of the window
    pub pane: PaneTarget,
}

/// Terminal multiplexer capability consumed by the session router
#[async_trait]
pub trait Multiplexer: Send + Sync {
    /// Whether a session with this exact name exists
    async fn has_session(&self, name: &SessionName) -> Result<bool, MultiplexerError>;

    /// Create a detached session
    async fn new_session(&self, name: &SessionName) -> Result<(), MultiplexerError>;

    /// Create a detached window in `session` and return its primary pane
    async fn new_window(
        &self,
        session: &SessionName,
        window: &WindowId,
    ) -> Result<WindowHandle, MultiplexerError>;

    /// Type `command` into `pane` and press Enter
    async fn exec(&self, pane: &PaneTarget, command: &str) -> Result<(), MultiplexerError>;
}
