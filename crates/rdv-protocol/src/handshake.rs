//! Identity handshake reader
//!
//! The handshake is exactly two newline-terminated lines, hostname then
//! username. No acknowledgement is sent; the agent starts shell I/O right
//! after the second line, so callers must keep using the same buffered
//! reader afterwards or those first bytes are lost.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{HandshakeError, HandshakeField};
use crate::identity::AgentIdentity;

/// Default upper bound for a single handshake line, terminator included
pub const DEFAULT_MAX_LINE: usize = 4096;

/// Default read deadline for each handshake line
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounds applied while reading the handshake
#[derive(Debug, Clone, Copy)]
pub struct HandshakeLimits {
    /// Per-line read deadline (None = wait forever)
    pub timeout: Option<Duration>,
    /// Maximum line length in bytes, terminator included
    pub max_line: usize,
}

impl Default for HandshakeLimits {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            max_line: DEFAULT_MAX_LINE,
        }
    }
}

/// Read the two-line handshake and return the sanitized identity
pub async fn read_identity<R>(
    reader: &mut R,
    limits: HandshakeLimits,
) -> Result<AgentIdentity, HandshakeError>
where
    R: AsyncBufRead + Unpin,
{
    let hostname = read_line(reader, HandshakeField::Hostname, limits).await?;
    let username = read_line(reader, HandshakeField::Username, limits).await?;

    let identity = AgentIdentity::from_raw(&hostname, &username);
    tracing::debug!(host = %identity.hostname, user = %identity.username, "handshake complete");
    Ok(identity)
}

async fn read_line<R>(
    reader: &mut R,
    field: HandshakeField,
    limits: HandshakeLimits,
) -> Result<String, HandshakeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = async {
        let mut limited = (&mut *reader).take(limits.max_line as u64);
        limited.read_until(b'\n', &mut buf).await
    };

    let result = match limits.timeout {
        Some(timeout) => tokio::time::timeout(timeout, read)
            .await
            .map_err(|_| HandshakeError::Timeout { field, timeout })?,
        None => read.await,
    };
    result.map_err(|source| HandshakeError::Io { field, source })?;

    if buf.last() != Some(&b'\n') {
        if buf.len() >= limits.max_line {
            return Err(HandshakeError::LineTooLong {
                field,
                max: limits.max_line,
            });
        }
        return Err(HandshakeError::Closed { field });
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn test_read_identity() {
        let mut reader = BufReader::new(&b"victim-host\r\nDOMAIN\\bob\n"[..]);
        let id = read_identity(&mut reader, HandshakeLimits::default())
            .await
            .unwrap();
        assert_eq!(id.hostname, "victim-host");
        assert_eq!(id.username, "DOMAIN_bob");
    }

    #[tokio::test]
    async fn test_trailing_bytes_stay_buffered() {
        let mut reader = BufReader::new(&b"host\nuser\nwhoami\n"[..]);
        read_identity(&mut reader, HandshakeLimits::default())
            .await
            .unwrap();

        let mut rest = String::new();
        reader.read_to_string(&mut rest).await.unwrap();
        assert_eq!(rest, "whoami\n");
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let mut reader = BufReader::new(&b""[..]);
        let err = read_identity(&mut reader, HandshakeLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HandshakeError::Closed {
                field: HandshakeField::Hostname
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_username_terminator() {
        let mut reader = BufReader::new(&b"host\nuser"[..]);
        let err = read_identity(&mut reader, HandshakeLimits::default())
            .await
            .unwrap_err();
        assert_eq!(err.field(), HandshakeField::Username);
        assert!(matches!(err, HandshakeError::Closed { .. }));
    }

    #[tokio::test]
    async fn test_line_too_long() {
        let limits = HandshakeLimits {
            timeout: None,
            max_line: 8,
        };
        let mut reader = BufReader::new(&b"averyveryverylonghostname\nuser\n"[..]);
        let err = read_identity(&mut reader, limits).await.unwrap_err();
        assert!(matches!(err, HandshakeError::LineTooLong { max: 8, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let (mut agent, server) = tokio::io::duplex(64);
        agent.write_all(b"host\n").await.unwrap();

        let limits = HandshakeLimits {
            timeout: Some(Duration::from_secs(5)),
            max_line: DEFAULT_MAX_LINE,
        };
        let mut reader = BufReader::new(server);
        let err = read_identity(&mut reader, limits).await.unwrap_err();
        assert!(matches!(
            err,
            HandshakeError::Timeout {
                field: HandshakeField::Username,
                ..
            }
        ));
        drop(agent);
    }
}
