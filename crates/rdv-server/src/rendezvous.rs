//! Rendezvous socket paths
//!
//! A rendezvous path names a Unix socket that does not exist yet. The
//! listener picks the name, the bridge process binds it, and the listener
//! removes it once the relay is over.

use std::fs::DirBuilder;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

/// Length of the random part of a rendezvous file name
const RANDOM_LEN: usize = 8;

/// Absolute path of a not-yet-bound rendezvous socket
///
/// Removal consumes the value, so a path is removed at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct RendezvousPath(PathBuf);

impl RendezvousPath {
    /// Pick a fresh socket path under `state_dir`, hinted by `user`
    ///
    /// A temp file is created to reserve a unique name and removed right
    /// away; only the name is kept.
    pub fn allocate(state_dir: &Path, user: &str) -> io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(&format!("{}.", user))
            .suffix(".sock")
            .rand_bytes(RANDOM_LEN)
            .tempfile_in(state_dir)?;

        let name = file
            .path()
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "temp file has no name"))?;
        file.close()?;

        let dir = std::fs::canonicalize(state_dir)?;
        Ok(Self(dir.join(name)))
    }

    /// Wrap an existing path
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Borrow the path
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Remove the socket file
    ///
    /// Returns whether a file was actually removed; a missing file is fine.
    pub fn remove(self) -> io::Result<bool> {
        match std::fs::remove_file(&self.0) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Create the state directory (mode 0700) if it does not exist
pub fn ensure_state_dir(dir: &Path) -> io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    tracing::debug!("Creating state directory {:?}", dir);
    DirBuilder::new().recursive(true).mode(0o700).create(dir)
}
