//! Starts, stops and reports on the FTP server.

use super::{
    engine::{EngineConfig, EngineFactory},
    error::ServerError,
    listen,
    registry::ConnectionInfo,
    session::SessionManager,
    shutdown,
};
use crate::{
    auth::Authenticator,
    config::{Config, ConfigError},
    driver::DriverFactory,
    notification::{CommandListener, PresenceListener},
    options::{FailedLoginsPolicy, PassiveHost, TlsFlags},
    tls::{CertificateAuthority, CertificateResolver, TlsSetup},
};
use serde::Serialize;
use slog::Drain;
use std::{fmt, net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::Mutex, task::JoinHandle};

/// Whether the server is accepting connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    /// Not listening
    Stopped,
    /// Listening
    Running,
}

/// The passive port range, both ends included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassiveRange {
    /// Lowest port
    pub min: u16,
    /// Highest port
    pub max: u16,
}

/// What [`ServerController::status`] reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Whether the server is listening
    pub state: ServerState,
    /// The configured control URL
    pub url: String,
    /// The passive port range
    pub passive_range: PassiveRange,
    /// The greeting sent to clients
    pub greeting: String,
    /// Whether anonymous logins are allowed
    pub anonymous_allowed: bool,
    /// The address actually bound, while running
    pub local_addr: Option<SocketAddr>,
}

struct Running {
    local_addr: SocketAddr,
    shutdown: Arc<shutdown::Notifier>,
    accept_loop: JoinHandle<()>,
}

enum Lifecycle {
    Stopped,
    Listening(Running),
}

/// Builds a [`ServerController`]. Obtained through [`ServerController::builder`].
pub struct ServerBuilder {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    engine_factory: Arc<dyn EngineFactory>,
    drivers: DriverFactory,
    certificate_authority: Option<Arc<dyn CertificateAuthority>>,
    logger: slog::Logger,
    failed_logins_policy: Option<FailedLoginsPolicy>,
    presence_listener: Option<Arc<dyn PresenceListener>>,
    command_listener: Option<Arc<dyn CommandListener>>,
    collect_metrics: bool,
    passive_host: Option<PassiveHost>,
    tls_flags: TlsFlags,
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .field("authenticator", &self.authenticator)
            .field("drivers", &self.drivers)
            .field("certificate_authority", &self.certificate_authority)
            .field("failed_logins_policy", &self.failed_logins_policy)
            .field("collect_metrics", &self.collect_metrics)
            .field("passive_host", &self.passive_host)
            .field("tls_flags", &self.tls_flags)
            .finish()
    }
}

impl ServerBuilder {
    /// Sets the factory storage drivers are created by. Defaults to one with only the local driver.
    pub fn driver_factory(mut self, drivers: DriverFactory) -> Self {
        self.drivers = drivers;
        self
    }

    /// Sets where certificate material for `ftp.hostname` comes from. Required when a hostname is
    /// configured.
    pub fn certificate_authority(mut self, authority: Arc<dyn CertificateAuthority>) -> Self {
        self.certificate_authority = Some(authority);
        self
    }

    /// Sets the structured logger.
    pub fn logger<L: Into<Option<slog::Logger>>>(mut self, logger: L) -> Self {
        self.logger = logger.into().unwrap_or_else(|| slog::Logger::root(slog_stdlog::StdLog.fuse(), slog::o!()));
        self
    }

    /// Temporarily locks out clients that fail to log in too often. Off by default.
    pub fn failed_logins_policy(mut self, policy: FailedLoginsPolicy) -> Self {
        self.failed_logins_policy = Some(policy);
        self
    }

    /// Sets a listener for logins and logouts.
    pub fn notify_presence(mut self, listener: impl PresenceListener + 'static) -> Self {
        self.presence_listener = Some(Arc::new(listener));
        self
    }

    /// Sets a listener for permitted commands.
    pub fn notify_command(mut self, listener: impl CommandListener + 'static) -> Self {
        self.command_listener = Some(Arc::new(listener));
        self
    }

    /// Enables collection of Prometheus metrics.
    pub fn metrics(mut self) -> Self {
        self.collect_metrics = true;
        self
    }

    /// Overrides how the passive address is advertised. Defaults to the host of `ftp.pasv_url`.
    pub fn passive_host<H: Into<PassiveHost>>(mut self, host: H) -> Self {
        self.passive_host = Some(host.into());
        self
    }

    /// Tunes the TLS configuration built from certificate material.
    pub fn tls_flags(mut self, flags: TlsFlags) -> Self {
        self.tls_flags = flags;
        self
    }

    /// Validates the configuration and creates the controller. Nothing is bound until
    /// [`ServerController::start`].
    pub fn build(self) -> Result<ServerController, ServerError> {
        let config = self.config;
        config.validate()?;
        let passive_host = match self.passive_host {
            Some(host) => host,
            None => config.passive_host()?,
        };
        let certificates = match (&config.hostname, self.certificate_authority) {
            (Some(_), Some(authority)) => Some(
                CertificateResolver::new(authority, config.certificate_timeout())
                    .logger(self.logger.clone())
                    .metrics(self.collect_metrics),
            ),
            (Some(hostname), None) => {
                return Err(ConfigError::NoCertificateResolver { hostname: hostname.clone() }.into());
            }
            (None, _) => None,
        };

        let drivers = Arc::new(self.drivers.logger(self.logger.clone()));
        let mut sessions = SessionManager::new(self.authenticator, drivers)
            .logger(self.logger.clone())
            .login_timeout(config.login_timeout())
            .failed_login_delay(config.failed_login_delay())
            .metrics(self.collect_metrics);
        if let Some(policy) = self.failed_logins_policy {
            sessions = sessions.failed_logins_policy(policy);
        }
        if let Some(listener) = self.presence_listener {
            sessions = sessions.notify_presence(listener);
        }
        if let Some(listener) = self.command_listener {
            sessions = sessions.notify_command(listener);
        }

        Ok(ServerController {
            config,
            sessions,
            certificates,
            engine_factory: self.engine_factory,
            passive_host,
            tls_flags: self.tls_flags,
            logger: self.logger,
            lifecycle: Mutex::new(Lifecycle::Stopped),
        })
    }
}

/// Owns the listening socket and the protocol engine, and keeps track of live sessions.
///
/// [`start`](ServerController::start), [`stop`](ServerController::stop),
/// [`restart`](ServerController::restart) and [`status`](ServerController::status) are serialized
/// by one lock.
pub struct ServerController {
    config: Config,
    sessions: SessionManager,
    certificates: Option<CertificateResolver>,
    engine_factory: Arc<dyn EngineFactory>,
    passive_host: PassiveHost,
    tls_flags: TlsFlags,
    logger: slog::Logger,
    lifecycle: Mutex<Lifecycle>,
}

impl fmt::Debug for ServerController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerController")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .field("certificates", &self.certificates)
            .field("passive_host", &self.passive_host)
            .finish()
    }
}

impl ServerController {
    /// Starts building a controller serving `config`, authenticating through `authenticator`
    /// (normally an [`AccountStore`](crate::auth::AccountStore)) and speaking FTP through the
    /// engines `engine_factory` builds.
    pub fn builder(config: Config, authenticator: Arc<dyn Authenticator>, engine_factory: impl EngineFactory + 'static) -> ServerBuilder {
        ServerBuilder {
            config,
            authenticator,
            engine_factory: Arc::new(engine_factory),
            drivers: DriverFactory::new(),
            certificate_authority: None,
            logger: slog::Logger::root(slog_stdlog::StdLog.fuse(), slog::o!()),
            failed_logins_policy: None,
            presence_listener: None,
            command_listener: None,
            collect_metrics: false,
            passive_host: None,
            tls_flags: TlsFlags::default(),
        }
    }

    /// The configuration being served.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The session manager connections are registered with.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Resolves TLS material, builds the engine and starts accepting connections. A certificate
    /// that can not be obtained is fatal: nothing is bound. Starting a running server does
    /// nothing.
    pub async fn start(&self) -> Result<(), ServerError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if let Lifecycle::Listening(running) = &*lifecycle {
            slog::info!(self.logger, "FTP server already listening on {}", running.local_addr);
            return Ok(());
        }
        *lifecycle = Lifecycle::Listening(self.launch().await?);
        Ok(())
    }

    async fn launch(&self) -> Result<Running, ServerError> {
        let tls = match (&self.config.hostname, &self.certificates) {
            (Some(hostname), Some(resolver)) => {
                let material = resolver.resolve(hostname).await.inspect_err(|e| {
                    slog::error!(self.logger, "Could not obtain a certificate, not starting: {}", e; "hostname" => hostname);
                })?;
                Some(TlsSetup::new(material, self.tls_flags)?)
            }
            (Some(hostname), None) => {
                return Err(ConfigError::NoCertificateResolver { hostname: hostname.clone() }.into());
            }
            (None, _) => {
                slog::warn!(self.logger, "No ftp.hostname configured, starting without TLS");
                None
            }
        };

        let engine = self.engine_factory.build(EngineConfig {
            greeting: self.config.greeting.clone(),
            passive_ports: self.config.passive_ports(),
            passive_host: self.passive_host.clone(),
            anonymous: self.config.anonymous,
            idle_session_timeout: self.config.idle_session_timeout(),
            tls,
            logger: self.logger.clone(),
        })?;

        let listener = TcpListener::bind(self.config.bind_address()?).await?;
        let local_addr = listener.local_addr()?;

        let shutdown = Arc::new(shutdown::Notifier::new());
        if let Some(cache) = self.sessions.failed_logins_cache() {
            let logger = self.logger.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { cache.sweeper(logger, shutdown).await });
        }
        let accept_loop = tokio::spawn(listen::accept_loop(
            listener,
            engine,
            self.sessions.clone(),
            shutdown.subscribe().await,
            self.logger.clone(),
        ));

        slog::info!(self.logger, "FTP server listening on {}", local_addr; "url" => &self.config.url);
        Ok(Running {
            local_addr,
            shutdown,
            accept_loop,
        })
    }

    async fn halt(&self, lifecycle: &mut Lifecycle) {
        let Lifecycle::Listening(running) = std::mem::replace(lifecycle, Lifecycle::Stopped) else {
            return;
        };
        running.shutdown.notify().await;
        running.shutdown.linger().await;
        if let Err(e) = running.accept_loop.await {
            slog::error!(self.logger, "Accept loop ended abnormally: {}", e);
        }
        slog::info!(self.logger, "FTP server stopped listening on {}", running.local_addr);
    }

    /// Stops accepting connections and waits until the listening socket is closed. Open sessions
    /// are left to the engine.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        self.halt(&mut lifecycle).await;
    }

    /// Stops, then starts again.
    pub async fn restart(&self) -> Result<(), ServerError> {
        let mut lifecycle = self.lifecycle.lock().await;
        self.halt(&mut lifecycle).await;
        *lifecycle = Lifecycle::Listening(self.launch().await?);
        Ok(())
    }

    /// Reports the lifecycle state and the served configuration.
    pub async fn status(&self) -> StatusReport {
        let lifecycle = self.lifecycle.lock().await;
        let (state, local_addr) = match &*lifecycle {
            Lifecycle::Stopped => (ServerState::Stopped, None),
            Lifecycle::Listening(running) => (ServerState::Running, Some(running.local_addr)),
        };
        StatusReport {
            state,
            url: self.config.url.clone(),
            passive_range: PassiveRange {
                min: self.config.pasv_min,
                max: self.config.pasv_max,
            },
            greeting: self.config.greeting.clone(),
            anonymous_allowed: self.config.anonymous,
            local_addr,
        }
    }

    /// The live sessions, without credentials.
    pub fn list_connections(&self) -> Vec<ConnectionInfo> {
        self.sessions.connections()
    }
}
