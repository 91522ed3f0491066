//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a multiplexer session (one per agent host)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionName(pub String);

impl SessionName {
    /// Create a new session name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the raw name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Window identifier, rendered as `<user>.<seq>`
///
/// `seq` is the owning session's running window count; it is never reused
/// within a process lifetime even if the window is closed externally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId {
    /// Sanitized username
    pub user: String,
    /// 1-based sequence number within the session
    pub seq: u32,
}

impl WindowId {
    /// Create a new window ID
    pub fn new(user: impl Into<String>, seq: u32) -> Self {
        Self {
            user: user.into(),
            seq,
        }
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.user, self.seq)
    }
}

/// Multiplexer target addressing a single pane
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaneTarget(pub String);

impl PaneTarget {
    /// Create a new pane target
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    /// Get the raw target string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaneTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a cached session handle came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionOrigin {
    /// Created by this process
    Created,
    /// Already present in the multiplexer, adopted by name
    Adopted,
}

impl fmt::Display for SessionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionOrigin::Created => write!(f, "created"),
            SessionOrigin::Adopted => write!(f, "adopted"),
        }
    }
}
