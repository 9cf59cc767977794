use super::material::{CertificateMaterial, PemError};
use crate::options::TlsFlags;
use rustls::{ServerConfig, crypto::CryptoProvider, server::NoServerSessionStorage};
use std::{fmt, sync::Arc, time::Duration};
use thiserror::Error;

#[cfg(not(any(feature = "aws_lc_rs", feature = "ring")))]
compile_error!("one of the `aws_lc_rs` or `ring` features must be enabled");

/// Error building a rustls configuration from certificate material.
#[derive(Debug, Error)]
pub enum TlsConfigError {
    /// The material could not be parsed.
    #[error("invalid certificate material")]
    Pem(#[from] PemError),
    /// The flags enable no protocol version.
    #[error("no TLS protocol version enabled")]
    NoProtocolVersions,
    /// rustls rejected the configuration.
    #[error("rustls rejected the configuration")]
    Rustls(#[from] rustls::Error),
}

#[cfg(feature = "aws_lc_rs")]
fn crypto_provider() -> CryptoProvider {
    rustls::crypto::aws_lc_rs::default_provider()
}

#[cfg(all(feature = "ring", not(feature = "aws_lc_rs")))]
fn crypto_provider() -> CryptoProvider {
    rustls::crypto::ring::default_provider()
}

#[cfg(feature = "aws_lc_rs")]
fn ticketer() -> Result<Arc<dyn rustls::server::ProducesTickets>, rustls::Error> {
    rustls::crypto::aws_lc_rs::Ticketer::new()
}

#[cfg(all(feature = "ring", not(feature = "aws_lc_rs")))]
fn ticketer() -> Result<Arc<dyn rustls::server::ProducesTickets>, rustls::Error> {
    rustls::crypto::ring::Ticketer::new()
}

/// Builds a single-certificate rustls server configuration from `material`.
pub fn new_config(material: &CertificateMaterial, flags: TlsFlags) -> Result<Arc<ServerConfig>, TlsConfigError> {
    let certs = material.certificate_chain()?;
    let key = material.private_key_der()?;

    let mut versions: Vec<&'static rustls::SupportedProtocolVersion> = vec![];
    if flags.contains(TlsFlags::V1_2) {
        versions.push(&rustls::version::TLS12);
    }
    if flags.contains(TlsFlags::V1_3) {
        versions.push(&rustls::version::TLS13);
    }
    if versions.is_empty() {
        return Err(TlsConfigError::NoProtocolVersions);
    }

    let mut config = ServerConfig::builder_with_provider(Arc::new(crypto_provider()))
        .with_protocol_versions(&versions)?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    // Session resumption with server side state (session ids)
    config.session_storage = if flags.contains(TlsFlags::RESUMPTION_SESS_ID) {
        TlsSessionCache::new(1024)
    } else {
        Arc::new(NoServerSessionStorage {})
    };
    // Session resumption with tickets, RFC 5077
    if flags.contains(TlsFlags::RESUMPTION_TICKETS) {
        config.ticketer = ticketer()?;
    }

    Ok(Arc::new(config))
}

/// Stores session ids server side.
struct TlsSessionCache {
    cache: moka::sync::Cache<Vec<u8>, Vec<u8>>,
}

impl fmt::Debug for TlsSessionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSessionCache").field("entries", &self.cache.entry_count()).finish()
    }
}

impl TlsSessionCache {
    /// `size` is the maximum number of stored sessions.
    fn new(size: u64) -> Arc<TlsSessionCache> {
        Arc::new(TlsSessionCache {
            cache: moka::sync::CacheBuilder::new(size).time_to_idle(Duration::from_secs(5 * 60)).build(),
        })
    }
}

impl rustls::server::StoresServerSessions for TlsSessionCache {
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> bool {
        self.cache.insert(key, value);
        true
    }

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.cache.get(key)
    }

    fn take(&self, key: &[u8]) -> Option<Vec<u8>> {
        // Only get: some clients (FileZilla) resume the same session id for every data connection.
        self.cache.get(key)
    }

    fn can_cache(&self) -> bool {
        true
    }
}
