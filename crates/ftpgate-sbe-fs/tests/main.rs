#![allow(missing_docs)]

use ftpgate_core::storage::{ErrorKind, FilesystemAdapter};
use ftpgate_sbe_fs::Filesystem;
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

struct Harness {
    root: PathBuf,
    _tempdir: tempfile::TempDir,
    fs: Filesystem,
}

#[fixture]
fn harness() -> Harness {
    let tempdir = tempfile::TempDir::new().unwrap();
    let root = tempdir.path().to_path_buf();
    std::fs::write(root.join("hello.txt"), b"hello world").unwrap();
    std::fs::create_dir(root.join("docs")).unwrap();
    let fs = Filesystem::new(&root).unwrap();
    Harness { root, _tempdir: tempdir, fs }
}

#[rstest]
fn root_is_home_directory(harness: Harness) {
    assert_eq!(harness.fs.root(), harness.root.as_path());
    assert_eq!(harness.fs.absolute("/"), harness.root);
}

#[rstest]
fn traversal_stays_below_root(harness: Harness) {
    let resolved = harness.fs.absolute("../../etc/passwd");
    assert!(resolved.starts_with(&harness.root));
    assert_eq!(resolved, harness.root.join("etc/passwd"));
}

#[rstest]
#[tokio::test]
async fn traversal_cannot_read_outside(harness: Harness) {
    let err = harness.fs.get(Path::new("../../etc/passwd"), 0).await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::PermanentFileNotAvailable);
}

#[rstest]
#[tokio::test]
async fn get_reads_from_offset(harness: Harness) {
    let mut reader = harness.fs.get(Path::new("/hello.txt"), 6).await.unwrap();
    let mut content = String::new();
    reader.read_to_string(&mut content).await.unwrap();
    assert_eq!(content, "world");
}

#[rstest]
#[tokio::test]
async fn put_then_list(harness: Harness) {
    let input: Box<dyn tokio::io::AsyncRead + Send + Sync + Unpin> = Box::new(&b"uploaded"[..]);
    let written = harness.fs.put(input, Path::new("/docs/new.txt"), 0).await.unwrap();
    assert_eq!(written, 8);
    assert_eq!(std::fs::read(harness.root.join("docs/new.txt")).unwrap(), b"uploaded");

    let entries = harness.fs.list(Path::new("/docs")).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, PathBuf::from("new.txt"));
    assert_eq!(entries[0].metadata.len, 8);
    assert!(entries[0].metadata.is_file());
}

#[rstest]
#[tokio::test]
async fn metadata_of_root(harness: Harness) {
    let meta = harness.fs.metadata(Path::new("/")).await.unwrap();
    assert!(meta.is_dir);
}

#[rstest]
#[tokio::test]
async fn mkd_rename_rmd(harness: Harness) {
    harness.fs.mkd(Path::new("/archive")).await.unwrap();
    harness.fs.rename(Path::new("/archive"), Path::new("/old")).await.unwrap();
    assert!(harness.root.join("old").is_dir());
    harness.fs.cwd(Path::new("/old")).await.unwrap();
    harness.fs.rmd(Path::new("/old")).await.unwrap();
    assert!(!harness.root.join("old").exists());
}

#[rstest]
#[tokio::test]
async fn cwd_into_file_fails(harness: Harness) {
    let err = harness.fs.cwd(Path::new("/hello.txt")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermanentDirectoryNotAvailable);
}

#[rstest]
#[tokio::test]
async fn del_missing_file(harness: Harness) {
    let err = harness.fs.del(Path::new("/nope.txt")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermanentFileNotAvailable);
}
