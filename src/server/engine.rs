//! The seam between the control plane and the FTP protocol engine.
//!
//! The controller builds one [`ProtocolEngine`] per start through an [`EngineFactory`] and hands
//! it every accepted connection together with its [`SessionHandle`]. The engine speaks FTP on the
//! stream and calls back into the handle to log in and to authorize each command.

use super::session::SessionHandle;
use crate::{BoxError, options::PassiveHost, tls::TlsSetup};
use async_trait::async_trait;
use std::{fmt::Debug, ops::RangeInclusive, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::net::TcpStream;

/// Error reported by an engine or its factory.
#[derive(Error, Debug)]
#[error("engine error: {msg}")]
pub struct EngineError {
    msg: String,
    #[source]
    source: Option<BoxError>,
}

impl EngineError {
    /// An error without an underlying cause.
    pub fn new(msg: impl Into<String>) -> Self {
        EngineError {
            msg: msg.into(),
            source: None,
        }
    }

    /// An error caused by `source`.
    pub fn with_source<E: Into<BoxError>>(msg: impl Into<String>, source: E) -> Self {
        EngineError {
            msg: msg.into(),
            source: Some(source.into()),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::with_source("io error", e)
    }
}

/// What the engine is started with.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sent to clients after connecting
    pub greeting: String,
    /// Ports for passive data connections
    pub passive_ports: RangeInclusive<u16>,
    /// The address advertised in passive replies
    pub passive_host: PassiveHost,
    /// Whether anonymous logins are allowed
    pub anonymous: bool,
    /// How long an idle session is kept open
    pub idle_session_timeout: Duration,
    /// Certificate material and rustls configuration, when a hostname is configured
    pub tls: Option<TlsSetup>,
    /// The server's logger
    pub logger: slog::Logger,
}

/// Serves the FTP protocol on accepted connections.
#[async_trait]
pub trait ProtocolEngine: Send + Sync + Debug {
    /// Serves one connection until the client leaves. The session is closed when `session` is
    /// dropped.
    async fn serve(&self, stream: TcpStream, session: SessionHandle) -> Result<(), EngineError>;
}

/// Builds the engine when the server starts.
pub trait EngineFactory: Send + Sync {
    /// Constructs an engine for `config`.
    fn build(&self, config: EngineConfig) -> Result<Arc<dyn ProtocolEngine>, EngineError>;
}

impl<F> EngineFactory for F
where
    F: Fn(EngineConfig) -> Result<Arc<dyn ProtocolEngine>, EngineError> + Send + Sync,
{
    fn build(&self, config: EngineConfig) -> Result<Arc<dyn ProtocolEngine>, EngineError> {
        self(config)
    }
}
