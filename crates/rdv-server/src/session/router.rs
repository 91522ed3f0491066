//! Session router
//!
//! For each agent callback: find or create the host's session, open a new
//! window for the user, pick a rendezvous socket path, and type the bridge
//! command into the window's pane.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rdv_core::error::{PaneWarning, RoutingError};
use rdv_core::traits::Multiplexer;
use rdv_core::types::{PaneTarget, SessionName, WindowId};
use rdv_protocol::AgentIdentity;

use super::SessionManager;
use crate::rendezvous::RendezvousPath;

/// Command typed into a new pane to ring the terminal bell
pub const BELL_COMMAND: &str = r"printf '\a'";

/// How to relaunch this program in bridge role
#[derive(Debug, Clone)]
pub struct BridgeCommand {
    /// Executable to run
    program: PathBuf,
    /// Pass `--raw` to the bridge
    raw: bool,
}

impl BridgeCommand {
    /// Create a bridge command for `program`
    pub fn new(program: impl Into<PathBuf>, raw: bool) -> Self {
        Self {
            program: program.into(),
            raw,
        }
    }

    /// Relaunch the currently running executable
    pub fn current_exe(raw: bool) -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, raw))
    }

    /// Render the shell command that starts a bridge on `socket`
    pub fn render(&self, socket: &Path) -> String {
        let program = self.program.to_string_lossy();
        let socket = socket.to_string_lossy();
        let mut words = vec![&*program, "--socket", &*socket];
        if self.raw {
            words.push("--raw");
        }
        shell_words::join(words)
    }
}

/// Result of routing one callback
#[derive(Debug)]
pub struct Route {
    /// Session the callback landed in
    pub session: SessionName,
    /// Window opened for it
    pub window: WindowId,
    /// Socket the bridge was told to bind
    pub path: RendezvousPath,
    /// Non-fatal problems hit along the way
    pub warnings: Vec<PaneWarning>,
}

/// Routes agent callbacks to multiplexer windows
pub struct SessionRouter {
    /// Terminal multiplexer
    mux: Arc<dyn Multiplexer>,
    /// Session cache
    sessions: Arc<SessionManager>,
    /// Directory for rendezvous sockets
    state_dir: PathBuf,
    /// Bridge relaunch command
    bridge: BridgeCommand,
}

impl SessionRouter {
    /// Create a new router
    pub fn new(
        mux: Arc<dyn Multiplexer>,
        sessions: Arc<SessionManager>,
        state_dir: PathBuf,
        bridge: BridgeCommand,
    ) -> Self {
        Self {
            mux,
            sessions,
            state_dir,
            bridge,
        }
    }

    /// Route a callback and return the socket path its bridge will bind
    ///
    /// Fails only if the session existence check or the socket path
    /// allocation fails. Pane problems are logged and returned as warnings.
    pub async fn route(&self, identity: &AgentIdentity) -> Result<Route, RoutingError> {
        let mut warnings = Vec::new();
        let session_name = SessionName::new(identity.hostname.as_str());

        let session = self
            .sessions
            .get_or_create(&session_name, self.mux.as_ref(), &mut warnings)
            .await?;

        let (window, pane) = session
            .open_window(&identity.username, self.mux.as_ref())
            .await;

        let path = RendezvousPath::allocate(&self.state_dir, &identity.username).map_err(
            |source| RoutingError::RendezvousPath {
                dir: self.state_dir.clone(),
                source,
            },
        )?;
        let command = self.bridge.render(path.as_path());

        match pane {
            Ok(pane) => self.launch(&pane, &window, command, &mut warnings).await,
            Err(warning) => {
                tracing::warn!(
                    session = %session.name,
                    window = %window,
                    "no pane to launch the bridge in, run by hand: {}",
                    command
                );
                warnings.push(warning);
            }
        }

        tracing::info!(
            session = %session.name,
            window = %window,
            origin = %session.origin,
            "new shell in tmux"
        );

        Ok(Route {
            session: session.name.clone(),
            window,
            path,
            warnings,
        })
    }

    /// Ring the bell in `pane`, then start the bridge there
    async fn launch(
        &self,
        pane: &PaneTarget,
        window: &WindowId,
        command: String,
        warnings: &mut Vec<PaneWarning>,
    ) {
        if let Err(source) = self.mux.exec(pane, BELL_COMMAND).await {
            let warning = PaneWarning::Bell {
                window: window.clone(),
                source,
            };
            tracing::warn!(window = %window, "{}", warning);
            warnings.push(warning);
        }

        if let Err(source) = self.mux.exec(pane, &command).await {
            let warning = PaneWarning::LaunchBridge {
                window: window.clone(),
                command,
                source,
            };
            tracing::warn!(window = %window, "{}", warning);
            warnings.push(warning);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_bridge_command() {
        let cmd = BridgeCommand::new("/usr/bin/rdv", false);
        assert_eq!(
            cmd.render(Path::new("/srv/.state/root.x1.sock")),
            "/usr/bin/rdv --socket /srv/.state/root.x1.sock"
        );

        let raw = BridgeCommand::new("/usr/bin/rdv", true);
        assert!(raw.render(Path::new("/tmp/a.sock")).ends_with(" --raw"));
    }

    #[test]
    fn test_render_quotes_unusual_paths() {
        let cmd = BridgeCommand::new("/opt/my tools/rdv", false);
        assert_eq!(
            cmd.render(Path::new("/srv/it's/root.x1.sock")),
            r"'/opt/my tools/rdv' --socket '/srv/it'\''s/root.x1.sock'"
        );
    }
}
