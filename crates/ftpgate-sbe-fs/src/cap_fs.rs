//! A capabilities-friendly workalike of the parts of tokio::fs the adapter needs.

use std::{io, path::Path, sync::Arc};

use tokio::{sync::mpsc, task::spawn_blocking};
use tokio_stream::wrappers::ReceiverStream;

async fn asyncify<F, T>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match spawn_blocking(f).await {
        Ok(res) => res,
        Err(_) => Err(io::Error::other("background task failed")),
    }
}

pub async fn create_dir(root: Arc<cap_std::fs::Dir>, path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref().to_owned();
    asyncify(move || root.create_dir(path)).await
}

pub async fn open(root: Arc<cap_std::fs::Dir>, path: impl AsRef<Path>) -> io::Result<cap_std::fs::File> {
    let path = path.as_ref().to_owned();
    asyncify(move || root.open(path)).await
}

pub async fn open_with(
    root: Arc<cap_std::fs::Dir>,
    path: impl AsRef<Path>,
    options: cap_std::fs::OpenOptions,
) -> io::Result<cap_std::fs::File> {
    let path = path.as_ref().to_owned();
    asyncify(move || root.open_with(path, &options)).await
}

/// Streams the entries of a directory, reading them on the blocking pool.
pub fn read_dir(root: Arc<cap_std::fs::Dir>, path: impl AsRef<Path>) -> ReceiverStream<io::Result<cap_std::fs::DirEntry>> {
    const CHUNKSIZE: usize = 32;

    let path = path.as_ref().to_owned();
    let (tx, rx) = mpsc::channel(CHUNKSIZE);
    spawn_blocking(move || match root.read_dir(path) {
        Ok(entries) => {
            for entry in entries {
                // The receiver went away, nobody is listening anymore.
                if tx.blocking_send(entry).is_err() {
                    break;
                }
            }
        }
        Err(e) => {
            let _ = tx.blocking_send(Err(e));
        }
    });
    ReceiverStream::new(rx)
}

pub async fn remove_dir(root: Arc<cap_std::fs::Dir>, path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref().to_owned();
    asyncify(move || root.remove_dir(path)).await
}

pub async fn remove_file(root: Arc<cap_std::fs::Dir>, path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref().to_owned();
    asyncify(move || root.remove_file(path)).await
}

pub async fn rename(root: Arc<cap_std::fs::Dir>, from: impl AsRef<Path>, to: impl AsRef<Path>) -> io::Result<()> {
    let from = from.as_ref().to_owned();
    let to = to.as_ref().to_owned();
    asyncify(move || root.rename(from, &root, to)).await
}

pub async fn symlink_metadata(root: Arc<cap_std::fs::Dir>, path: impl AsRef<Path>) -> io::Result<cap_std::fs::Metadata> {
    let path = path.as_ref().to_owned();
    asyncify(move || root.symlink_metadata(path)).await
}
