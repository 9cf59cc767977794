use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fmt;
use thiserror::Error;

/// PEM encoded TLS material for one hostname.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateMaterial {
    /// The private key
    pub private_key: String,
    /// The leaf certificate
    pub certificate: String,
    /// Intermediate certificates, possibly empty
    pub chain: String,
}

impl fmt::Debug for CertificateMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateMaterial")
            .field("private_key", &"*******")
            .field("certificate", &format_args!("{} bytes", self.certificate.len()))
            .field("chain", &format_args!("{} bytes", self.chain.len()))
            .finish()
    }
}

/// The PEM text could not be turned into DER certificates and a key.
#[derive(Debug, Error)]
pub enum PemError {
    /// The PEM text is malformed.
    #[error("malformed PEM")]
    Malformed(#[from] std::io::Error),
    /// There is no certificate in the certificate PEM.
    #[error("no certificate found")]
    NoCertificate,
    /// There is no private key in the key PEM.
    #[error("no private key found")]
    NoPrivateKey,
}

impl CertificateMaterial {
    /// The leaf certificate followed by the chain, in DER.
    pub fn certificate_chain(&self) -> Result<Vec<CertificateDer<'static>>, PemError> {
        let mut certs = rustls_pemfile::certs(&mut self.certificate.as_bytes()).collect::<Result<Vec<_>, _>>()?;
        if certs.is_empty() {
            return Err(PemError::NoCertificate);
        }
        for cert in rustls_pemfile::certs(&mut self.chain.as_bytes()) {
            certs.push(cert?);
        }
        Ok(certs)
    }

    /// The first private key (PKCS#8, PKCS#1 or SEC1) in the key PEM.
    pub fn private_key_der(&self) -> Result<PrivateKeyDer<'static>, PemError> {
        rustls_pemfile::private_key(&mut self.private_key.as_bytes())?.ok_or(PemError::NoPrivateKey)
    }
}
