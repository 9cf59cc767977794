use super::error::Error;
use async_trait::async_trait;
use std::{
    fmt::{self, Debug},
    path::{Path, PathBuf},
    time::SystemTime,
};

/// Result type used by [`FilesystemAdapter`] operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Adapter supports resuming transfers at an offset (`REST`).
pub const FEATURE_RESTART: u32 = 0b0000_0001;

/// File metadata as reported by an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Size in bytes
    pub len: u64,
    /// Is this a directory
    pub is_dir: bool,
    /// Is this a symbolic link
    pub is_symlink: bool,
    /// Last modification time, if the back-end tracks it
    pub modified: Option<SystemTime>,
}

impl Metadata {
    /// Is this a regular file.
    pub fn is_file(&self) -> bool {
        !self.is_dir && !self.is_symlink
    }
}

/// A directory entry.
#[derive(Debug, Clone)]
pub struct Fileinfo {
    /// Path of the entry relative to the listed directory
    pub path: PathBuf,
    /// Its metadata
    pub metadata: Metadata,
}

impl fmt::Display for Fileinfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.metadata.is_dir { 'd' } else { '-' };
        write!(f, "{kind} {:>12} {}", self.metadata.len, self.path.display())
    }
}

/// The filesystem a session's file commands are served from.
///
/// Every path is interpreted relative to the adapter's [`root`](FilesystemAdapter::root), and an
/// adapter must never reach outside of it: `..` components are clamped at the root.
#[async_trait]
pub trait FilesystemAdapter: Send + Sync + Debug {
    /// The directory everything is confined to.
    fn root(&self) -> &Path;

    /// Optional features, as a bit set of the `FEATURE_*` constants.
    fn supported_features(&self) -> u32 {
        0
    }

    /// Metadata of the file or directory at `path`.
    async fn metadata(&self, path: &Path) -> Result<Metadata>;

    /// The entries of the directory at `path`.
    async fn list(&self, path: &Path) -> Result<Vec<Fileinfo>>;

    /// Opens the file at `path` for reading, starting at byte `start_pos`.
    async fn get(&self, path: &Path, start_pos: u64) -> Result<Box<dyn tokio::io::AsyncRead + Send + Sync + Unpin>>;

    /// Writes `input` to the file at `path` from byte `start_pos` on. Returns the number of bytes
    /// written.
    async fn put(&self, input: Box<dyn tokio::io::AsyncRead + Send + Sync + Unpin>, path: &Path, start_pos: u64) -> Result<u64>;

    /// Deletes the file at `path`.
    async fn del(&self, path: &Path) -> Result<()>;

    /// Creates the directory `path`.
    async fn mkd(&self, path: &Path) -> Result<()>;

    /// Removes the empty directory `path`.
    async fn rmd(&self, path: &Path) -> Result<()>;

    /// Renames `from` to `to`.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Succeeds if `path` is a directory that can be changed into.
    async fn cwd(&self, path: &Path) -> Result<()>;
}
