//! Listener configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use rdv_protocol::{HandshakeLimits, DEFAULT_MAX_LINE, DEFAULT_TIMEOUT};

use super::serde_utils::{duration_millis, duration_secs};
use crate::error::ConfigError;

/// Configuration for the listener role
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface address on which to bind
    pub host: String,

    /// Port on which to bind
    pub port: u16,

    /// Directory holding `server.pem` and `server.key`
    pub keys_dir: PathBuf,

    /// Working directory for rendezvous sockets
    pub state_dir: PathBuf,

    /// Per-line read deadline for the agent handshake
    #[serde(with = "duration_secs")]
    pub handshake_timeout: Duration,

    /// Maximum handshake line length in bytes
    pub max_handshake_line: usize,

    /// Retry policy for dialing the bridge socket
    pub dial: BackoffConfig,

    /// tmux invocation settings
    pub tmux: TmuxConfig,

    /// Ask spawned bridges to put the operator terminal in raw mode
    pub raw_terminal: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8443,
            keys_dir: PathBuf::from("./certs"),
            state_dir: PathBuf::from(".state"),
            handshake_timeout: DEFAULT_TIMEOUT,
            max_handshake_line: DEFAULT_MAX_LINE,
            dial: BackoffConfig::default(),
            tmux: TmuxConfig::default(),
            raw_terminal: false,
        }
    }
}

impl ListenerConfig {
    /// Get the TLS bind address (host:port)
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Path of the certificate chain
    pub fn cert_path(&self) -> PathBuf {
        self.keys_dir.join("server.pem")
    }

    /// Path of the private key
    pub fn key_path(&self) -> PathBuf {
        self.keys_dir.join("server.key")
    }

    /// Reject settings the listener cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_handshake_line == 0 {
            return Err(ConfigError::Invalid(
                "max_handshake_line must be at least 1".to_string(),
            ));
        }
        self.dial
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("dial: {}", e)))
    }

    /// Handshake bounds derived from this configuration
    ///
    /// A zero timeout disables the read deadline.
    pub fn handshake_limits(&self) -> HandshakeLimits {
        HandshakeLimits {
            timeout: (!self.handshake_timeout.is_zero()).then_some(self.handshake_timeout),
            max_line: self.max_handshake_line,
        }
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_millis")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_millis")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,

    /// Total attempts before giving up
    pub max_attempts: u32,
}

impl BackoffConfig {
    /// Check that every delay this policy produces is a finite duration
    pub fn validate(&self) -> Result<(), String> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(format!(
                "multiplier must be a finite number >= 1, got {}",
                self.multiplier
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(format!("jitter must be within 0..=1, got {}", self.jitter));
        }
        if self.max < self.initial {
            return Err(format!(
                "max ({:?}) is shorter than initial ({:?})",
                self.max, self.initial
            ));
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: 0.1,
            max_attempts: 10,
        }
    }
}

/// How to invoke tmux
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmuxConfig {
    /// tmux executable
    pub binary: PathBuf,

    /// Dedicated tmux server name (`tmux -L`)
    pub socket_name: Option<String>,
}

impl Default for TmuxConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tmux"),
            socket_name: None,
        }
    }
}
