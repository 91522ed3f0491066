//! tmux-backed multiplexer
//!
//! Every operation is a single `tmux` invocation. Session targets use the
//! `=name` form so tmux matches the name exactly instead of by prefix.

use std::path::PathBuf;
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;

use rdv_core::config::TmuxConfig;
use rdv_core::error::MultiplexerError;
use rdv_core::traits::{Multiplexer, WindowHandle};
use rdv_core::types::{PaneTarget, SessionName, WindowId};

/// Drives a tmux server through its command line
#[derive(Debug, Clone)]
pub struct TmuxMultiplexer {
    /// tmux executable
    binary: PathBuf,
    /// Server name passed as `-L`
    socket_name: Option<String>,
}

impl TmuxMultiplexer {
    /// Create a multiplexer from configuration
    pub fn new(config: &TmuxConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            socket_name: config.socket_name.clone(),
        }
    }

    /// Full argument list for a tmux subcommand
    fn args<'a>(&'a self, args: &[&'a str]) -> Vec<&'a str> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if let Some(name) = &self.socket_name {
            full.push("-L");
            full.push(name.as_str());
        }
        full.extend_from_slice(args);
        full
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.binary.display(), args.join(" "))
    }

    /// Run tmux and return its output whatever the exit status
    async fn output(&self, args: &[&str]) -> Result<Output, MultiplexerError> {
        let args = self.args(args);
        tracing::trace!("running {}", self.describe(&args));

        Command::new(&self.binary)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| MultiplexerError::Spawn {
                command: self.describe(&args),
                source,
            })
    }

    /// Run tmux and fail unless it exits successfully
    async fn run(&self, args: &[&str]) -> Result<String, MultiplexerError> {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(MultiplexerError::CommandFailed {
                command: self.describe(&self.args(args)),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Multiplexer for TmuxMultiplexer {
    async fn has_session(&self, name: &SessionName) -> Result<bool, MultiplexerError> {
        let target = format!("={}", name);
        let args = ["has-session", "-t", target.as_str()];
        let output = self.output(&args).await?;

        // tmux exits 1 both for a missing session and for no running server
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            status => Err(MultiplexerError::CommandFailed {
                command: self.describe(&self.args(&args)),
                status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    async fn new_session(&self, name: &SessionName) -> Result<(), MultiplexerError> {
        self.run(&["new-session", "-d", "-s", name.as_str()])
            .await
            .map(|_| ())
    }

    async fn new_window(
        &self,
        session: &SessionName,
        window: &WindowId,
    ) -> Result<WindowHandle, MultiplexerError> {
        let target = format!("={}:", session);
        let name = window.to_string();
        let args = [
            "new-window",
            "-d",
            "-P",
            "-F",
            "#{pane_id}",
            "-t",
            target.as_str(),
            "-n",
            name.as_str(),
        ];
        let stdout = self.run(&args).await?;

        let pane = stdout.trim();
        if !pane.starts_with('%') {
            return Err(MultiplexerError::UnexpectedOutput {
                command: self.describe(&self.args(&args)),
                output: stdout,
            });
        }

        Ok(WindowHandle {
            id: window.clone(),
            pane: PaneTarget::new(pane),
        })
    }

    async fn exec(&self, pane: &PaneTarget, command: &str) -> Result<(), MultiplexerError> {
        self.run(&["send-keys", "-t", pane.as_str(), "-l", command])
            .await?;
        self.run(&["send-keys", "-t", pane.as_str(), "Enter"])
            .await
            .map(|_| ())
    }
}
