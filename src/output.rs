//! Snapshot persistence.
//!
//! Each snapshot is written in full and replaces the previous one; there is
//! no history and no incremental update.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::codec::encode_feed;
use crate::error::PersistError;
use crate::gtfs_rt::FeedMessage;

/// Destination for finished snapshots.
pub trait SnapshotSink: Send + Sync {
    fn persist(&self, feed: &FeedMessage) -> Result<(), PersistError>;
}

/// Writes the binary feed to a single file.
///
/// The bytes go to a temporary file next to the destination, which is then
/// renamed over it, so readers never observe a half-written feed.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> PersistError {
        PersistError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl SnapshotSink for FileSink {
    fn persist(&self, feed: &FeedMessage) -> Result<(), PersistError> {
        let bytes = encode_feed(feed);
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(&bytes).map_err(|e| self.io_error(e))?;
        tmp.flush().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "Snapshot written");
        Ok(())
    }
}
