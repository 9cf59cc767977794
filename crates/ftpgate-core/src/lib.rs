//! Core traits and types shared by the ftpgate control plane and its back-ends.
//!
//! Back-ends implement [`storage::FilesystemAdapter`] to serve a session's files and
//! [`repository::AccountRepository`] to persist accounts. The [`command`] module holds the fixed
//! FTP command vocabulary that permissions are expressed in.

pub mod account;
pub mod command;
pub mod repository;
pub mod storage;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
