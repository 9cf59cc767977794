//! An ftpgate [`FilesystemAdapter`] that serves files from a directory on local disk.
//!
//! Every path a client sends is resolved lexically against the adapter's root before it reaches
//! the disk: a leading `/` means the root and `..` never climbs above it. The directory itself is
//! opened through [`cap_std`], so symlinks cannot be used to escape either.
//!
//! ```no_run
//! use ftpgate_sbe_fs::Filesystem;
//!
//! let fs = Filesystem::new("/mnt/alice").unwrap();
//! assert_eq!(fs.absolute("../../etc/passwd"), std::path::Path::new("/mnt/alice/etc/passwd"));
//! ```

mod cap_fs;

use async_trait::async_trait;
use ftpgate_core::storage::{Error, ErrorKind, FEATURE_RESTART, Fileinfo, FilesystemAdapter, Metadata, Result};
use futures::{future::TryFutureExt, stream::TryStreamExt};
use std::{
    fmt::Debug,
    io,
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use tokio::io::AsyncSeekExt;

/// A [`FilesystemAdapter`] that keeps its files inside a root directory on local disk.
#[derive(Debug)]
pub struct Filesystem {
    root_fd: Arc<cap_std::fs::Dir>,
    root: PathBuf,
}

/// Resolves a client supplied path to one relative to the root. `..` clamps at the root and the
/// root itself maps to `.`.
fn confine(path: &Path) -> PathBuf {
    let mut confined = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => confined.push(part),
            Component::ParentDir => {
                confined.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    if confined.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        confined
    }
}

fn to_metadata(meta: &cap_std::fs::Metadata) -> Metadata {
    Metadata {
        len: meta.len(),
        is_dir: meta.is_dir(),
        is_symlink: meta.file_type().is_symlink(),
        modified: meta.modified().ok().map(cap_std::time::SystemTime::into_std),
    }
}

impl Filesystem {
    /// Opens `root` as the adapter's root. Nothing outside of it can be reached: with the root at
    /// `/srv/ftp`, a client asking for `hello.txt` gets `/srv/ftp/hello.txt`.
    pub fn new<P: Into<PathBuf>>(root: P) -> io::Result<Self> {
        let root = root.into();
        let root_fd = Arc::new(cap_std::fs::Dir::open_ambient_dir(&root, cap_std::ambient_authority())?);
        Ok(Filesystem { root_fd, root })
    }

    /// Where `path` lands on disk. Always inside the root.
    pub fn absolute<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        let confined = confine(path.as_ref());
        if confined == Path::new(".") {
            self.root.clone()
        } else {
            self.root.join(confined)
        }
    }
}

#[async_trait]
impl FilesystemAdapter for Filesystem {
    fn root(&self) -> &Path {
        &self.root
    }

    fn supported_features(&self) -> u32 {
        FEATURE_RESTART
    }

    #[tracing_attributes::instrument]
    async fn metadata(&self, path: &Path) -> Result<Metadata> {
        let path = confine(path);
        let meta = cap_fs::symlink_metadata(self.root_fd.clone(), &path)
            .await
            .map_err(|e| Error::new(ErrorKind::PermanentFileNotAvailable, e))?;
        Ok(to_metadata(&meta))
    }

    #[tracing_attributes::instrument]
    async fn list(&self, path: &Path) -> Result<Vec<Fileinfo>> {
        let path = confine(path);
        let entries = cap_fs::read_dir(self.root_fd.clone(), &path)
            .and_then(|dirent| {
                let entry_path: PathBuf = dirent.file_name().into();
                let fullpath = path.join(&entry_path);
                cap_fs::symlink_metadata(self.root_fd.clone(), fullpath).map_ok(move |meta| Fileinfo {
                    path: entry_path,
                    metadata: to_metadata(&meta),
                })
            })
            .try_collect::<Vec<_>>()
            .await?;
        Ok(entries)
    }

    async fn get(&self, path: &Path, start_pos: u64) -> Result<Box<dyn tokio::io::AsyncRead + Send + Sync + Unpin>> {
        let path = confine(path);
        let file = cap_fs::open(self.root_fd.clone(), path)
            .await
            .map_err(|e| Error::new(ErrorKind::PermanentFileNotAvailable, e))?;
        let mut file = tokio::fs::File::from_std(file.into_std());
        if start_pos > 0 {
            file.seek(io::SeekFrom::Start(start_pos)).await?;
        }
        Ok(Box::new(tokio::io::BufReader::with_capacity(4096, file)))
    }

    async fn put(&self, input: Box<dyn tokio::io::AsyncRead + Send + Sync + Unpin>, path: &Path, start_pos: u64) -> Result<u64> {
        let path = confine(path);
        let mut options = cap_std::fs::OpenOptions::new();
        options.write(true).create(true);
        let file = cap_fs::open_with(self.root_fd.clone(), path, options).await?;
        let mut file = tokio::fs::File::from_std(file.into_std());
        file.set_len(start_pos).await?;
        file.seek(io::SeekFrom::Start(start_pos)).await?;

        let mut reader = tokio::io::BufReader::with_capacity(4096, input);
        let mut writer = tokio::io::BufWriter::with_capacity(4096, file);
        let copied = tokio::io::copy(&mut reader, &mut writer).await?;
        tokio::io::AsyncWriteExt::flush(&mut writer).await?;
        Ok(copied)
    }

    #[tracing_attributes::instrument]
    async fn del(&self, path: &Path) -> Result<()> {
        cap_fs::remove_file(self.root_fd.clone(), confine(path)).await.map_err(Error::from)
    }

    #[tracing_attributes::instrument]
    async fn mkd(&self, path: &Path) -> Result<()> {
        cap_fs::create_dir(self.root_fd.clone(), confine(path)).await.map_err(Error::from)
    }

    #[tracing_attributes::instrument]
    async fn rmd(&self, path: &Path) -> Result<()> {
        cap_fs::remove_dir(self.root_fd.clone(), confine(path)).await.map_err(Error::from)
    }

    #[tracing_attributes::instrument]
    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = confine(from);
        let to = confine(to);
        let meta = cap_fs::symlink_metadata(self.root_fd.clone(), &from)
            .await
            .map_err(|e| Error::new(ErrorKind::PermanentFileNotAvailable, e))?;
        if !(meta.is_file() || meta.is_dir()) {
            return Err(Error::from(ErrorKind::PermanentFileNotAvailable));
        }
        cap_fs::rename(self.root_fd.clone(), from, to)
            .await
            .map_err(|e| Error::new(ErrorKind::PermanentFileNotAvailable, e))
    }

    #[tracing_attributes::instrument]
    async fn cwd(&self, path: &Path) -> Result<()> {
        let meta = self.metadata(path).await?;
        if meta.is_dir {
            Ok(())
        } else {
            Err(Error::from(ErrorKind::PermanentDirectoryNotAvailable))
        }
    }
}
