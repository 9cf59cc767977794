use super::material::CertificateMaterial;
use crate::{BoxError, metrics};
use async_trait::async_trait;
use slog::Drain;
use std::{fmt::Debug, future::Future, sync::Arc, time::Duration};
use thiserror::Error;

/// Where certificate material comes from.
#[async_trait]
pub trait CertificateAuthority: Send + Sync + Debug {
    /// The current material for `hostname`, or `None` if none has been issued.
    async fn lookup(&self, hostname: &str) -> Result<Option<CertificateMaterial>, BoxError>;

    /// Asks for material to be issued for `hostname`. Returns once the request has completed.
    async fn request_issuance(&self, hostname: &str) -> Result<(), BoxError>;
}

/// Error returned by [`CertificateResolver::resolve`].
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// Nothing was found, even after requesting issuance.
    #[error("no certificate available for '{hostname}'")]
    CertificateUnavailable {
        /// The hostname
        hostname: String,
    },
    /// The authority failed to answer a lookup.
    #[error("certificate authority failed for '{hostname}'")]
    Authority {
        /// The hostname
        hostname: String,
        /// The failure
        #[source]
        source: BoxError,
    },
    /// The authority did not answer in time.
    #[error("certificate authority did not answer within {timeout:?} for '{hostname}'")]
    Timeout {
        /// The hostname
        hostname: String,
        /// The bound that was exceeded
        timeout: Duration,
    },
}

/// Resolves certificate material for a hostname: one lookup, and on a miss one issuance request
/// followed by one more lookup. Every round-trip to the authority is bounded by a timeout.
#[derive(Debug, Clone)]
pub struct CertificateResolver {
    authority: Arc<dyn CertificateAuthority>,
    timeout: Duration,
    collect_metrics: bool,
    logger: slog::Logger,
}

impl CertificateResolver {
    /// A resolver asking `authority`, bounding each round-trip by `timeout`.
    pub fn new(authority: Arc<dyn CertificateAuthority>, timeout: Duration) -> Self {
        CertificateResolver {
            authority,
            timeout,
            collect_metrics: false,
            logger: slog::Logger::root(slog_stdlog::StdLog.fuse(), slog::o!()),
        }
    }

    /// Enables counting resolution outcomes.
    pub fn metrics(mut self, collect: bool) -> Self {
        self.collect_metrics = collect;
        self
    }

    fn count(&self, outcome: &str) {
        if self.collect_metrics {
            metrics::certificate_resolution(outcome);
        }
    }

    /// Sets the logger.
    pub fn logger(mut self, logger: slog::Logger) -> Self {
        self.logger = logger;
        self
    }

    async fn bounded<T, F>(&self, hostname: &str, fut: F) -> Result<Result<T, BoxError>, ResolutionError>
    where
        F: Future<Output = Result<T, BoxError>>,
    {
        tokio::time::timeout(self.timeout, fut).await.map_err(|_| ResolutionError::Timeout {
            hostname: hostname.to_string(),
            timeout: self.timeout,
        })
    }

    async fn lookup(&self, hostname: &str) -> Result<Option<CertificateMaterial>, ResolutionError> {
        self.bounded(hostname, self.authority.lookup(hostname))
            .await?
            .map_err(|source| ResolutionError::Authority {
                hostname: hostname.to_string(),
                source,
            })
    }

    /// Returns the material for `hostname`, requesting issuance once if there is none yet.
    pub async fn resolve(&self, hostname: &str) -> Result<CertificateMaterial, ResolutionError> {
        if let Some(material) = self.lookup(hostname).await? {
            self.count("found");
            return Ok(material);
        }

        slog::info!(self.logger, "No certificate found, requesting issuance"; "hostname" => hostname);
        match self.bounded(hostname, self.authority.request_issuance(hostname)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => slog::warn!(self.logger, "Certificate issuance failed: {}", e; "hostname" => hostname),
            Err(e) => slog::warn!(self.logger, "{}", e; "hostname" => hostname),
        }

        match self.lookup(hostname).await? {
            Some(material) => {
                self.count("issued");
                Ok(material)
            }
            None => {
                self.count("unavailable");
                Err(ResolutionError::CertificateUnavailable {
                    hostname: hostname.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct ScriptedAuthority {
        issue_works: bool,
        issue_fails: bool,
        issued: std::sync::atomic::AtomicBool,
        lookups: AtomicUsize,
        issuances: AtomicUsize,
    }

    fn material() -> CertificateMaterial {
        CertificateMaterial {
            private_key: "key".to_string(),
            certificate: "cert".to_string(),
            chain: String::new(),
        }
    }

    #[async_trait]
    impl CertificateAuthority for ScriptedAuthority {
        async fn lookup(&self, _hostname: &str) -> Result<Option<CertificateMaterial>, BoxError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.issued.load(Ordering::SeqCst).then(material))
        }

        async fn request_issuance(&self, _hostname: &str) -> Result<(), BoxError> {
            self.issuances.fetch_add(1, Ordering::SeqCst);
            if self.issue_fails {
                return Err("rate limited".into());
            }
            if self.issue_works {
                self.issued.store(true, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    #[derive(Debug)]
    struct StuckAuthority;

    #[async_trait]
    impl CertificateAuthority for StuckAuthority {
        async fn lookup(&self, _hostname: &str) -> Result<Option<CertificateMaterial>, BoxError> {
            std::future::pending().await
        }

        async fn request_issuance(&self, _hostname: &str) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn existing_material_is_returned_without_issuance() {
        let authority = Arc::new(ScriptedAuthority::default());
        authority.issued.store(true, Ordering::SeqCst);
        let resolver = CertificateResolver::new(authority.clone(), Duration::from_secs(1));
        assert_eq!(resolver.resolve("ftp.example.com").await.unwrap(), material());
        assert_eq!(authority.issuances.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn issuance_then_one_more_lookup() {
        let authority = Arc::new(ScriptedAuthority {
            issue_works: true,
            ..Default::default()
        });
        let resolver = CertificateResolver::new(authority.clone(), Duration::from_secs(1));
        assert_eq!(resolver.resolve("ftp.example.com").await.unwrap(), material());
        assert_eq!(authority.lookups.load(Ordering::SeqCst), 2);
        assert_eq!(authority.issuances.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn still_missing_after_one_retry() {
        let authority = Arc::new(ScriptedAuthority::default());
        let resolver = CertificateResolver::new(authority.clone(), Duration::from_secs(1));
        let err = resolver.resolve("ftp.example.com").await.unwrap_err();
        assert!(matches!(err, ResolutionError::CertificateUnavailable { .. }));
        assert_eq!(authority.lookups.load(Ordering::SeqCst), 2);
        assert_eq!(authority.issuances.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_issuance_still_looks_up_once_more() {
        let authority = Arc::new(ScriptedAuthority {
            issue_fails: true,
            ..Default::default()
        });
        let resolver = CertificateResolver::new(authority.clone(), Duration::from_secs(1));
        let err = resolver.resolve("ftp.example.com").await.unwrap_err();
        assert!(matches!(err, ResolutionError::CertificateUnavailable { .. }));
        assert_eq!(authority.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn lookups_are_bounded() {
        let resolver = CertificateResolver::new(Arc::new(StuckAuthority), Duration::from_millis(20));
        let err = resolver.resolve("ftp.example.com").await.unwrap_err();
        assert!(matches!(err, ResolutionError::Timeout { .. }));
    }
}
