//! Bidirectional relay between the agent stream and the bridge socket
//!
//! Both directions run concurrently in the calling task. When either one
//! stops, for any reason, the other is cancelled and both write halves are
//! shut down. The call returns after both directions have stopped, then
//! removes the rendezvous socket file.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::rendezvous::RendezvousPath;

const BUFFER_SIZE: usize = 16 * 1024;

/// A copy direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the first stream to the second
    AToB,
    /// From the second stream to the first
    BToA,
}

/// Why one copy direction stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpEnd {
    /// Source reached end of stream
    Eof,
    /// Source or destination failed
    Error(io::ErrorKind),
    /// The other direction stopped first
    Cancelled,
}

/// Outcome of a finished relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    /// Bytes copied from A to B
    pub a_to_b: u64,
    /// Bytes copied from B to A
    pub b_to_a: u64,
    /// How the A to B direction ended
    pub a_to_b_end: PumpEnd,
    /// How the B to A direction ended
    pub b_to_a_end: PumpEnd,
    /// Whether the rendezvous file was still present at cleanup
    pub removed_socket: bool,
}

impl RelayStats {
    /// The direction that stopped on its own, if any
    pub fn first_closed(&self) -> Option<Direction> {
        match (self.a_to_b_end, self.b_to_a_end) {
            (PumpEnd::Cancelled, PumpEnd::Cancelled) => None,
            (PumpEnd::Cancelled, _) => Some(Direction::BToA),
            _ => Some(Direction::AToB),
        }
    }
}

/// Relay bytes between `a` and `b` until either side closes
///
/// Copy errors are treated as a normal end of session. The rendezvous
/// `path` is removed exactly once when both directions have stopped.
pub async fn relay<A, B>(a: A, b: B, path: RendezvousPath) -> RelayStats
where
    A: AsyncRead + AsyncWrite + Send,
    B: AsyncRead + AsyncWrite + Send,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);
    let closed = CancellationToken::new();

    let ((a_to_b, a_to_b_end), (b_to_a, b_to_a_end)) = tokio::join!(
        pump(&mut a_read, &mut b_write, &closed),
        pump(&mut b_read, &mut a_write, &closed),
    );

    drop((a_read, a_write, b_read, b_write));

    let socket = path.as_path().to_path_buf();
    let removed_socket = match path.remove() {
        Ok(removed) => removed,
        Err(e) => {
            tracing::warn!(path = ?socket, "failed to remove rendezvous socket: {}", e);
            false
        }
    };

    let stats = RelayStats {
        a_to_b,
        b_to_a,
        a_to_b_end,
        b_to_a_end,
        removed_socket,
    };
    tracing::debug!(path = ?socket, ?stats, "relay finished");
    stats
}

/// Copy `reader` into `writer` until EOF, error or cancellation
///
/// Always cancels `closed` and shuts `writer` down on the way out.
async fn pump<R, W>(reader: &mut R, writer: &mut W, closed: &CancellationToken) -> (u64, PumpEnd)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut total = 0u64;

    let end = loop {
        let n = tokio::select! {
            _ = closed.cancelled() => break PumpEnd::Cancelled,
            read = reader.read(&mut buf) => match read {
                Ok(0) => break PumpEnd::Eof,
                Ok(n) => n,
                Err(e) => break PumpEnd::Error(e.kind()),
            },
        };

        tokio::select! {
            _ = closed.cancelled() => break PumpEnd::Cancelled,
            written = writer.write_all(&buf[..n]) => {
                if let Err(e) = written {
                    break PumpEnd::Error(e.kind());
                }
                total += n as u64;
            }
        }
    };

    closed.cancel();
    if let Err(e) = writer.shutdown().await {
        tracing::trace!("shutdown after relay: {}", e);
    }
    (total, end)
}
