//! The [`FilesystemAdapter`] trait that storage back-ends implement to serve an authorised
//! session's files.
//!
//! An adapter is created per session by the gateway's driver factory and is rooted at the
//! account's home directory. Implementations are expected to be cheap to construct.

mod adapter;
mod error;

pub use adapter::{FEATURE_RESTART, Fileinfo, FilesystemAdapter, Metadata, Result};
pub use error::{Error, ErrorKind};
