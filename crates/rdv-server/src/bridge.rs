//! Bridge role
//!
//! Runs inside a tmux pane. Binds the rendezvous socket, accepts exactly
//! one connection from the listener, and wires it to the operator's
//! terminal: bytes from the connection go to the terminal output, bytes
//! typed at the terminal go to the connection.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

const BUFFER_SIZE: usize = 8 * 1024;

/// One-shot listening endpoint on a rendezvous socket
pub struct BridgeEndpoint {
    listener: UnixListener,
    path: PathBuf,
}

impl BridgeEndpoint {
    /// Bind the socket at exactly `path`
    pub fn bind(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let listener = UnixListener::bind(&path)?;
        Ok(Self { listener, path })
    }

    /// Socket path this endpoint is bound to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept the single connection; the listener is closed afterwards
    pub async fn accept(self) -> io::Result<UnixStream> {
        let (stream, _) = self.listener.accept().await?;
        Ok(stream)
    }
}

/// Byte counts for a finished terminal session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttachStats {
    /// Bytes written to the terminal output
    pub displayed: u64,
    /// Bytes sent from the terminal input
    pub typed: u64,
}

/// Wire `conn` to a terminal's `input` and `output` until `conn` closes
///
/// When `input` reaches end of file the connection's write side is shut
/// down and output keeps flowing until the peer closes.
pub async fn attach<S, I, O>(conn: S, mut input: I, mut output: O) -> io::Result<AttachStats>
where
    S: AsyncRead + AsyncWrite,
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let (mut conn_read, mut conn_write) = tokio::io::split(conn);
    let mut typed = 0u64;

    let displayed = {
        let inbound = async {
            let mut buf = vec![0u8; BUFFER_SIZE];
            let mut total = 0u64;
            loop {
                let n = conn_read.read(&mut buf).await?;
                if n == 0 {
                    return Ok::<u64, io::Error>(total);
                }
                output.write_all(&buf[..n]).await?;
                output.flush().await?;
                total += n as u64;
            }
        };

        let outbound = async {
            let mut buf = vec![0u8; BUFFER_SIZE];
            loop {
                let n = input.read(&mut buf).await?;
                if n == 0 {
                    return conn_write.shutdown().await;
                }
                conn_write.write_all(&buf[..n]).await?;
                typed += n as u64;
            }
        };

        tokio::pin!(inbound);
        tokio::pin!(outbound);
        let mut typing = true;

        loop {
            tokio::select! {
                displayed = &mut inbound => break displayed?,
                closed = &mut outbound, if typing => {
                    typing = false;
                    if let Err(e) = closed {
                        tracing::debug!("terminal input closed: {}", e);
                    }
                }
            }
        }
    };

    Ok(AttachStats { displayed, typed })
}

/// Restores cooked mode when dropped
pub struct RawModeGuard;

impl RawModeGuard {
    /// Put the terminal in raw mode
    pub fn enable() -> io::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = crossterm::terminal::disable_raw_mode() {
            tracing::warn!("failed to restore terminal mode: {}", e);
        }
    }
}

/// Run the bridge role against `path` using this process's stdin/stdout
///
/// Failing to bind is fatal. Once the single connection ends the bridge
/// is done; it never listens again.
pub async fn run(path: &Path, raw: bool) -> Result<AttachStats> {
    let endpoint = BridgeEndpoint::bind(path)
        .with_context(|| format!("Failed to bind bridge socket {:?}", path))?;
    tracing::info!(socket = ?endpoint.path(), "Bridge listening");

    let conn = endpoint
        .accept()
        .await
        .context("Failed to accept relay connection")?;
    tracing::info!(socket = ?path, "Relay connected");

    let _raw = if raw {
        Some(RawModeGuard::enable().context("Failed to enable raw mode")?)
    } else {
        None
    };

    let stats = attach(conn, tokio::io::stdin(), tokio::io::stdout()).await?;
    tracing::info!(
        displayed = stats.displayed,
        typed = stats.typed,
        "Relay closed"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::duplex;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_attach_relays_both_ways() {
        let (conn, mut peer) = duplex(64);
        let (term_in, mut keyboard) = duplex(64);
        let (term_out, mut screen) = duplex(64);

        let session = tokio::spawn(attach(conn, term_in, term_out));

        peer.write_all(b"$ ").await.unwrap();
        let mut buf = [0u8; 2];
        screen.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"$ ");

        keyboard.write_all(b"ls\n").await.unwrap();
        let mut buf = [0u8; 3];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ls\n");

        drop(peer);
        let stats = timeout(Duration::from_secs(5), session)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(stats, AttachStats { displayed: 2, typed: 3 });
    }

    #[tokio::test]
    async fn test_input_eof_keeps_output_flowing() {
        let (conn, mut peer) = duplex(64);
        let (term_in, keyboard) = duplex(64);
        let (term_out, mut screen) = duplex(64);

        let session = tokio::spawn(attach(conn, term_in, term_out));
        drop(keyboard);

        // Peer sees EOF from the terminal side but can still send
        let mut rest = Vec::new();
        timeout(Duration::from_secs(5), peer.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
        assert!(rest.is_empty());

        peer.write_all(b"bye\n").await.unwrap();
        let mut buf = [0u8; 4];
        screen.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"bye\n");

        drop(peer);
        let stats = timeout(Duration::from_secs(5), session)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(stats.displayed, 4);
    }

    #[tokio::test]
    async fn test_endpoint_single_accept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("root.abc.sock");

        let endpoint = BridgeEndpoint::bind(&path).unwrap();
        assert!(path.exists());

        let client = tokio::spawn({
            let path = path.clone();
            async move { UnixStream::connect(&path).await.unwrap() }
        });
        let _conn = endpoint.accept().await.unwrap();
        let _client = client.await.unwrap();

        // Listener is gone, nobody accepts a second connection
        assert!(UnixStream::connect(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_bind_existing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken.sock");
        std::fs::write(&path, b"").unwrap();

        assert!(BridgeEndpoint::bind(&path).is_err());
    }
}
