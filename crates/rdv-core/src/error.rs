//! Core error types for rendezvous

use rdv_protocol::HandshakeError;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::{SessionName, WindowId};

/// Reasons a single agent connection is abandoned
#[derive(Error, Debug)]
pub enum RdvError {
    /// Agent handshake failed
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Session routing failed
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    /// Bridge endpoint could not be reached
    #[error("Dial error: {0}")]
    Dial(#[from] DialError),
}

/// Failures reported by the terminal multiplexer
#[derive(Error, Debug)]
pub enum MultiplexerError {
    /// The multiplexer binary could not be run
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The multiplexer ran but reported failure
    #[error("`{command}` exited with {status:?}: {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    /// The multiplexer output could not be interpreted
    #[error("unexpected output from `{command}`: {output:?}")]
    UnexpectedOutput { command: String, output: String },
}

/// Routing failures that abandon the agent connection
#[derive(Error, Debug)]
pub enum RoutingError {
    /// The session existence check failed
    #[error("session check for {session} failed: {source}")]
    SessionCheck {
        session: SessionName,
        #[source]
        source: MultiplexerError,
    },

    /// A rendezvous path could not be allocated
    #[error("temp file failed in {dir:?}: {source}")]
    RendezvousPath {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Non-fatal problems hit while preparing a pane
///
/// These are logged and carried alongside a successful route; an operator
/// looking at the pane can recover by hand.
#[derive(Error, Debug)]
pub enum PaneWarning {
    /// Session creation reported an error
    #[error("creating session {session} failed: {source}")]
    SessionCreate {
        session: SessionName,
        #[source]
        source: MultiplexerError,
    },

    /// Window creation reported an error
    #[error("creating window {window} failed: {source}")]
    WindowCreate {
        window: WindowId,
        #[source]
        source: MultiplexerError,
    },

    /// The bell notification could not be sent
    #[error("bell in {window} failed: {source}")]
    Bell {
        window: WindowId,
        #[source]
        source: MultiplexerError,
    },

    /// The bridge relaunch command could not be sent
    #[error("launching bridge in {window} failed ({command}): {source}")]
    LaunchBridge {
        window: WindowId,
        command: String,
        #[source]
        source: MultiplexerError,
    },
}

/// Failure to reach the bridge endpoint
#[derive(Error, Debug)]
pub enum DialError {
    /// Every attempt failed
    #[error("bridge socket {path:?} unreachable after {attempts} attempts: {source}")]
    Exhausted {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
}

/// TLS key material errors
#[derive(Error, Debug)]
pub enum TlsError {
    /// Key material file could not be read
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Certificate file contained no certificates
    #[error("no certificates found in {0:?}")]
    NoCertificates(PathBuf),

    /// Key file contained no private key
    #[error("no private key found in {0:?}")]
    NoPrivateKey(PathBuf),

    /// The TLS library rejected the configuration
    #[error("invalid TLS configuration: {0}")]
    Config(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
