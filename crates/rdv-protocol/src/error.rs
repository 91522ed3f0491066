//! Handshake error types

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Which handshake line was being read when an error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeField {
    /// First line
    Hostname,
    /// Second line
    Username,
}

impl fmt::Display for HandshakeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeField::Hostname => write!(f, "hostname"),
            HandshakeField::Username => write!(f, "username"),
        }
    }
}

/// Errors that can occur while reading the agent handshake
///
/// Any of these means the connection is abandoned without side effects.
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// Stream ended before a newline terminator was seen
    #[error("{field} read failed: connection closed before newline")]
    Closed { field: HandshakeField },

    /// Line exceeded the configured bound
    #[error("{field} read failed: line exceeds {max} bytes")]
    LineTooLong { field: HandshakeField, max: usize },

    /// Read deadline elapsed
    #[error("{field} read failed: no data within {timeout:?}")]
    Timeout {
        field: HandshakeField,
        timeout: Duration,
    },

    /// I/O error
    #[error("{field} read failed: {source}")]
    Io {
        field: HandshakeField,
        #[source]
        source: std::io::Error,
    },
}

impl HandshakeError {
    /// The handshake line that failed
    pub fn field(&self) -> HandshakeField {
        match self {
            HandshakeError::Closed { field }
            | HandshakeError::LineTooLong { field, .. }
            | HandshakeError::Timeout { field, .. }
            | HandshakeError::Io { field, .. } => *field,
        }
    }
}
