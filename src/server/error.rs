//! Contains the error type used by [`ServerController`](crate::ServerController)

use super::engine::EngineError;
use crate::{BoxError, config::ConfigError, tls::ResolutionError, tls::TlsConfigError};
use thiserror::Error;

/// Error returned when the server can not be started.
#[derive(Error, Debug)]
#[error("server error: {msg}")]
pub struct ServerError {
    msg: String,
    #[source]
    source: BoxError,
}

impl ServerError {
    fn new<E: std::error::Error + Send + Sync + 'static>(msg: impl Into<String>, source: E) -> ServerError {
        ServerError {
            msg: msg.into(),
            source: Box::new(source),
        }
    }

    /// Whether start failed because no certificate could be obtained.
    pub fn is_certificate_unavailable(&self) -> bool {
        matches!(self.source.downcast_ref::<ResolutionError>(), Some(ResolutionError::CertificateUnavailable { .. }))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError::new("io error", e)
    }
}

impl From<ConfigError> for ServerError {
    fn from(e: ConfigError) -> Self {
        ServerError::new(format!("invalid configuration: {e}"), e)
    }
}

impl From<ResolutionError> for ServerError {
    fn from(e: ResolutionError) -> Self {
        ServerError::new(format!("could not resolve certificate: {e}"), e)
    }
}

impl From<TlsConfigError> for ServerError {
    fn from(e: TlsConfigError) -> Self {
        ServerError::new(format!("error with TLS configuration: {e}"), e)
    }
}

impl From<EngineError> for ServerError {
    fn from(e: EngineError) -> Self {
        ServerError::new("could not build protocol engine", e)
    }
}
