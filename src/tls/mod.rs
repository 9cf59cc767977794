//! Acquiring certificate material and turning it into a TLS configuration.
//!
//! A [`CertificateResolver`] asks a [`CertificateAuthority`] for the material of the configured
//! hostname, requesting issuance once when there is none. The material then becomes a rustls
//! [`ServerConfig`](rustls::ServerConfig) through [`TlsSetup::new`].

mod config;
mod directory;
mod material;
mod resolver;

pub use config::{TlsConfigError, new_config};
pub use directory::DirectoryAuthority;
pub use material::{CertificateMaterial, PemError};
pub use resolver::{CertificateAuthority, CertificateResolver, ResolutionError};

use crate::options::TlsFlags;
use std::sync::Arc;

/// The TLS material handed to the protocol engine: the PEM text as resolved and the rustls
/// configuration built from it.
#[derive(Debug, Clone)]
pub struct TlsSetup {
    /// The resolved PEM material
    pub material: CertificateMaterial,
    /// The configuration built from it
    pub config: Arc<rustls::ServerConfig>,
}

impl TlsSetup {
    /// Builds the rustls configuration for `material`.
    pub fn new(material: CertificateMaterial, flags: TlsFlags) -> Result<TlsSetup, TlsConfigError> {
        let config = new_config(&material, flags)?;
        Ok(TlsSetup { material, config })
    }

    /// An acceptor for upgrading connections, e.g. after `AUTH TLS`.
    pub fn acceptor(&self) -> tokio_rustls::TlsAcceptor {
        tokio_rustls::TlsAcceptor::from(self.config.clone())
    }
}
