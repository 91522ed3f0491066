//! Agent identity and name sanitization
//!
//! Hostnames and usernames end up as tmux session/window names and as
//! filesystem path components. tmux rejects `.` and `:` style separators in
//! targets, and Windows agents report users as `DOMAIN\user`, so a fixed
//! character mapping is applied to both lines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity an agent reports at the start of its connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentIdentity {
    /// Sanitized hostname, used as the session name
    pub hostname: String,
    /// Sanitized username, used as the window name prefix
    pub username: String,
}

impl AgentIdentity {
    /// Build an identity from raw handshake lines
    pub fn from_raw(hostname: &str, username: &str) -> Self {
        Self {
            hostname: sanitize(hostname),
            username: sanitize(username),
        }
    }
}

impl fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.hostname)
    }
}

/// Normalize a raw handshake line into a safe identifier
///
/// Strips one trailing line terminator (`\n` or `\r\n`), then maps
/// `.`, `\` and `$` to `_` and space to `-`. The mapping never produces a
/// mapped character, so applying it twice is the same as applying it once.
pub fn sanitize(raw: &str) -> String {
    let line = raw
        .strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(raw);

    line.chars()
        .map(|c| match c {
            '.' | '\\' | '$' => '_',
            ' ' => '-',
            other => other,
        })
        .collect()
}
