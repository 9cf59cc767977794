use crate::BoxError;
use derive_more::Display;
use thiserror::Error;

/// The error returned by filesystem adapters. The [`ErrorKind`] decides which FTP reply the
/// protocol engine sends, so adapters should pick it with care.
#[derive(Debug, Error)]
#[error("storage error: {kind}")]
pub struct Error {
    kind: ErrorKind,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    /// Creates a storage error of the given kind caused by `error`.
    pub fn new<E>(kind: ErrorKind, error: E) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            kind,
            source: Some(error.into()),
        }
    }

    /// What the engine should do with the failure.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The underlying `std::io::Error`, if that is what caused this.
    pub fn io_error(&self) -> Option<&std::io::Error> {
        self.source.as_ref()?.downcast_ref::<std::io::Error>()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error { kind, source: None }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::PermanentFileNotAvailable,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            std::io::ErrorKind::DirectoryNotEmpty => ErrorKind::PermanentDirectoryNotEmpty,
            std::io::ErrorKind::NotADirectory => ErrorKind::PermanentDirectoryNotAvailable,
            std::io::ErrorKind::StorageFull => ErrorKind::InsufficientStorageSpaceError,
            std::io::ErrorKind::InvalidFilename => ErrorKind::FileNameNotAllowedError,
            _ => ErrorKind::LocalError,
        };
        Error::new(kind, err)
    }
}

/// Failure categories, each mapping onto an FTP reply code.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum ErrorKind {
    /// Retryable, for instance a busy file.
    #[display("450 Transient file not available")]
    TransientFileNotAvailable,
    /// The file does not exist or cannot be reached, including paths outside the adapter's root.
    #[display("550 Permanent file not available")]
    PermanentFileNotAvailable,
    /// The directory does not exist.
    #[display("550 Permanent directory not available")]
    PermanentDirectoryNotAvailable,
    /// RMD on a directory that still has entries.
    #[display("550 The directory is not empty")]
    PermanentDirectoryNotEmpty,
    /// Access refused by the back-end.
    #[display("550 Permission denied")]
    PermissionDenied,
    /// The transfer was cut off.
    #[display("426 Connection closed transfer aborted")]
    ConnectionClosed,
    /// Anything the back-end could not classify.
    #[display("451 Local error")]
    LocalError,
    /// The back-end ran out of space.
    #[display("452 Insufficient storage space error")]
    InsufficientStorageSpaceError,
    /// The account's allocation is exhausted.
    #[display("552 Exceeded storage allocation error")]
    ExceededStorageAllocationError,
    /// The name is not valid on this back-end.
    #[display("553 File name not allowed error")]
    FileNameNotAllowedError,
    /// The back-end does not implement the operation.
    #[display("502 Command not implemented")]
    CommandNotImplemented,
}
