//! Per-connection session state and the login and command-interception pipeline.

use super::{
    failed_logins::{FailedLoginsCache, LockState},
    registry::{ConnectionInfo, ConnectionRegistry},
};
use crate::{
    auth::{Authenticator, Credentials, Password},
    driver::DriverFactory,
    metrics,
    notification::{CommandEvent, CommandListener, EventMeta, PresenceEvent, PresenceListener, nop::NopListener},
    options::{self, FailedLoginsPolicy},
    policy::{CommandPolicy, PermissionPolicy, Verdict},
};
use ftpgate_core::{account::Account, command::CommandToken, storage::FilesystemAdapter};
use slog::Drain;
use std::{
    future::Future,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Why a login was not accepted. Deliberately says nothing about which part of the credentials
/// was wrong.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// Unknown user, wrong password, locked out or timed out
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// The session already logged in
    #[error("Already logged in")]
    AlreadyLoggedIn,
    /// An earlier login on this session failed, or the session was closed
    #[error("Session is no longer accepting logins")]
    Refused,
    /// The account's storage could not be opened
    #[error("Server fault")]
    ServerFault,
}

/// What the protocol engine receives from a successful login.
#[derive(Debug, Clone)]
pub struct Authorization {
    /// The account's storage
    pub filesystem: Arc<dyn FilesystemAdapter>,
    /// The explicitly denied commands, as bare tokens
    pub deny_list: Vec<CommandToken>,
    /// The full policy
    pub policy: CommandPolicy,
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connected, not logged in
    Connected,
    /// A login is in flight
    Authenticating,
    /// Logged in
    Authorized,
    /// A login failed
    Rejected,
    /// The connection is gone
    Closed,
}

struct Authorized {
    account: Arc<Account>,
    policy: CommandPolicy,
    filesystem: Arc<dyn FilesystemAdapter>,
}

enum SessionState {
    Connected,
    Authenticating,
    Authorized(Authorized),
    Rejected,
    Closed,
}

impl SessionState {
    fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Connected => SessionPhase::Connected,
            SessionState::Authenticating => SessionPhase::Authenticating,
            SessionState::Authorized(_) => SessionPhase::Authorized,
            SessionState::Rejected => SessionPhase::Rejected,
            SessionState::Closed => SessionPhase::Closed,
        }
    }
}

/// Hands out a [`SessionHandle`] per connection and holds what sessions share: the authenticator,
/// the driver factory, the live connection registry, the failed-login cache and the listeners.
#[derive(Debug, Clone)]
pub struct SessionManager {
    authenticator: Arc<dyn Authenticator>,
    drivers: Arc<DriverFactory>,
    registry: Arc<ConnectionRegistry>,
    failed_logins: Option<Arc<FailedLoginsCache>>,
    presence_listener: Arc<dyn PresenceListener>,
    command_listener: Arc<dyn CommandListener>,
    login_timeout: Duration,
    failed_login_delay: Duration,
    collect_metrics: bool,
    logger: slog::Logger,
}

impl SessionManager {
    /// A manager authenticating through `authenticator` and opening storage through `drivers`.
    pub fn new(authenticator: Arc<dyn Authenticator>, drivers: Arc<DriverFactory>) -> Self {
        SessionManager {
            authenticator,
            drivers,
            registry: Arc::new(ConnectionRegistry::default()),
            failed_logins: None,
            presence_listener: Arc::new(NopListener {}),
            command_listener: Arc::new(NopListener {}),
            login_timeout: Duration::from_secs(options::DEFAULT_LOGIN_TIMEOUT_SECS),
            failed_login_delay: Duration::from_millis(options::DEFAULT_FAILED_LOGIN_DELAY_MS),
            collect_metrics: false,
            logger: slog::Logger::root(slog_stdlog::StdLog.fuse(), slog::o!()),
        }
    }

    /// Sets the logger sessions derive theirs from.
    pub fn logger(mut self, logger: slog::Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Locks out clients according to `policy`.
    pub fn failed_logins_policy(mut self, policy: FailedLoginsPolicy) -> Self {
        self.failed_logins = Some(FailedLoginsCache::new(policy));
        self
    }

    /// Sets the listener for logins and logouts.
    pub fn notify_presence(mut self, listener: Arc<dyn PresenceListener>) -> Self {
        self.presence_listener = listener;
        self
    }

    /// Sets the listener for permitted commands.
    pub fn notify_command(mut self, listener: Arc<dyn CommandListener>) -> Self {
        self.command_listener = listener;
        self
    }

    /// Bounds the authenticator round-trip of a login.
    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// How long a failed login waits before answering.
    pub fn failed_login_delay(mut self, delay: Duration) -> Self {
        self.failed_login_delay = delay;
        self
    }

    /// Enables collection of session metrics.
    pub fn metrics(mut self, collect: bool) -> Self {
        self.collect_metrics = collect;
        self
    }

    pub(crate) fn failed_logins_cache(&self) -> Option<Arc<FailedLoginsCache>> {
        self.failed_logins.clone()
    }

    /// The live sessions.
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.registry.list()
    }

    /// Registers a new connection from `remote`.
    pub fn connected(&self, remote: SocketAddr) -> SessionHandle {
        let id = Uuid::new_v4();
        let logger = self.logger.new(slog::o!("trace-id" => id.to_string(), "source" => remote.to_string()));
        self.registry.insert(id, remote);
        if self.collect_metrics {
            metrics::session_opened();
        }
        slog::info!(logger, "FTP connection from {} ({})", remote.ip(), remote);
        SessionHandle {
            id,
            remote,
            manager: self.clone(),
            state: Mutex::new(SessionState::Connected),
            sequence: AtomicU64::new(0),
            logger,
        }
    }
}

/// One client connection, from accept until the handle is dropped.
///
/// [`login`](SessionHandle::login) and [`intercept`](SessionHandle::intercept) take the same lock,
/// so no command of this session is processed while its login is in flight.
pub struct SessionHandle {
    id: Uuid,
    remote: SocketAddr,
    manager: SessionManager,
    state: Mutex<SessionState>,
    sequence: AtomicU64,
    logger: slog::Logger,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").field("id", &self.id).field("remote", &self.remote).finish()
    }
}

// Spawned so that a slow listener never holds up the session. Outside a runtime, e.g. when a
// handle is dropped after the runtime shut down, the event is dropped.
fn spawn_detached<F: Future<Output = ()> + Send + 'static>(fut: F) {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(fut);
    }
}

impl SessionHandle {
    /// Identifies the session in logs and events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The client's address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// The session's logger, carrying its trace id and source address.
    pub fn logger(&self) -> &slog::Logger {
        &self.logger
    }

    /// Where the session is in its lifecycle.
    pub async fn phase(&self) -> SessionPhase {
        self.state.lock().await.phase()
    }

    /// The account the session logged in as.
    pub async fn account(&self) -> Option<Arc<Account>> {
        match &*self.state.lock().await {
            SessionState::Authorized(a) => Some(a.account.clone()),
            _ => None,
        }
    }

    fn meta(&self, username: &str) -> EventMeta {
        EventMeta {
            username: username.to_string(),
            trace_id: self.id.to_string(),
            sequence_number: self.sequence.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn emit_presence(&self, event: PresenceEvent, username: &str) {
        let listener = self.manager.presence_listener.clone();
        let meta = self.meta(username);
        spawn_detached(async move { listener.receive_presence_event(event, meta).await });
    }

    fn emit_command(&self, event: CommandEvent, username: &str) {
        let listener = self.manager.command_listener.clone();
        let meta = self.meta(username);
        spawn_detached(async move { listener.receive_command_event(event, meta).await });
    }

    fn count_login(&self, outcome: &str) {
        if self.manager.collect_metrics {
            metrics::login(outcome);
        }
    }

    async fn reject(&self, state: &mut SessionState, username: &str) -> SessionError {
        if let Some(cache) = &self.manager.failed_logins {
            match cache.failed(self.remote.ip(), username).await {
                Some(LockState::MaxFailuresReached) => {
                    slog::warn!(self.logger, "Too many failed logins, locking out"; "username" => username)
                }
                Some(LockState::AlreadyLocked) => slog::warn!(self.logger, "Login attempt while locked out"; "username" => username),
                None => {}
            }
        }
        tokio::time::sleep(self.manager.failed_login_delay).await;
        *state = SessionState::Rejected;
        self.count_login("failure");
        SessionError::InvalidCredentials
    }

    /// Logs in. On success the session is bound to the account, its storage is opened and the
    /// policy derived. Any failure leaves the session rejected.
    pub async fn login(&self, username: &str, password: Password) -> Result<Authorization, SessionError> {
        let mut state = self.state.lock().await;
        match &*state {
            SessionState::Connected => {}
            SessionState::Authorized(_) | SessionState::Authenticating => return Err(SessionError::AlreadyLoggedIn),
            SessionState::Rejected | SessionState::Closed => return Err(SessionError::Refused),
        }
        *state = SessionState::Authenticating;
        let ip = self.remote.ip();

        if let Some(cache) = &self.manager.failed_logins {
            if cache.locked(ip, username).await {
                slog::warn!(self.logger, "Refusing login of locked out user"; "username" => username);
                return Err(self.reject(&mut state, username).await);
            }
        }

        let creds = Credentials {
            password: Some(password),
            source_ip: ip,
        };
        let authenticate = self.manager.authenticator.authenticate(username, &creds);
        let authenticated = tokio::time::timeout(self.manager.login_timeout, authenticate).await;
        let account = match authenticated {
            Ok(Ok(account)) => account,
            Ok(Err(e)) => {
                slog::info!(self.logger, "Login failed: {}", e; "username" => username, "code" => e.code());
                return Err(self.reject(&mut state, username).await);
            }
            Err(_) => {
                slog::warn!(self.logger, "Login timed out after {:?}", self.manager.login_timeout; "username" => username);
                return Err(self.reject(&mut state, username).await);
            }
        };

        if let Some(cache) = &self.manager.failed_logins {
            if let Some(LockState::AlreadyLocked) = cache.success(ip, username).await {
                slog::warn!(self.logger, "Correct credentials for locked out user"; "username" => username);
                return Err(self.reject(&mut state, username).await);
            }
        }

        let policy = PermissionPolicy::derive(&account);
        let filesystem = match self.manager.drivers.create(&account.driver, &account).await {
            Ok(fs) => fs,
            Err(e) => {
                slog::error!(self.logger, "Could not open storage: {}", e; "username" => username, "driver" => account.driver.name());
                *state = SessionState::Rejected;
                self.count_login("driver_error");
                return Err(SessionError::ServerFault);
            }
        };

        self.manager.registry.bind(&self.id, account.summary());
        slog::info!(self.logger, "User {} logged in", account.username; "driver" => account.driver.name(), "policy" => %policy);
        self.emit_presence(PresenceEvent::LoggedIn, &account.username);
        self.count_login("success");

        let authorization = Authorization {
            filesystem: filesystem.clone(),
            deny_list: policy.deny_list(),
            policy,
        };
        *state = SessionState::Authorized(Authorized {
            account: Arc::new(account),
            policy,
            filesystem,
        });
        Ok(authorization)
    }

    async fn dispatch(&self, token: CommandToken, path: &str) -> (Verdict, Option<Arc<dyn FilesystemAdapter>>) {
        let state = self.state.lock().await;
        let SessionState::Authorized(authorized) = &*state else {
            return (Verdict::NotLoggedIn, None);
        };
        let username = &authorized.account.username;
        let verdict = authorized.policy.authorize(token);
        if self.manager.collect_metrics {
            metrics::command(token.as_str(), &verdict.to_string());
        }
        match verdict {
            Verdict::Permitted => {
                slog::info!(self.logger, "FTP user {} {} {}", username, token, path);
                self.emit_command(
                    CommandEvent {
                        token,
                        path: path.to_string(),
                    },
                    username,
                );
                (verdict, Some(authorized.filesystem.clone()))
            }
            _ => {
                slog::info!(self.logger, "FTP user {} denied {} {}", username, token, path);
                (verdict, None)
            }
        }
    }

    /// Decides whether the session may run `token` on `path`. Permitted commands are logged and
    /// reported to the command listener.
    pub async fn intercept(&self, token: CommandToken, path: &str) -> Verdict {
        self.dispatch(token, path).await.0
    }

    /// Like [`intercept`](SessionHandle::intercept), but hands out the storage when the command is
    /// permitted.
    pub async fn filesystem_for(&self, token: CommandToken, path: &str) -> Result<Arc<dyn FilesystemAdapter>, Verdict> {
        match self.dispatch(token, path).await {
            (Verdict::Permitted, Some(fs)) => Ok(fs),
            (verdict, _) => Err(verdict),
        }
    }

    /// Ends the session. Dropping the handle does the same.
    pub async fn close(&self) {
        let previous = std::mem::replace(&mut *self.state.lock().await, SessionState::Closed);
        self.closed(previous);
    }

    fn closed(&self, previous: SessionState) {
        if let SessionState::Closed = previous {
            return;
        }
        self.manager.registry.remove(&self.id);
        if self.manager.collect_metrics {
            metrics::session_closed();
        }
        if let SessionState::Authorized(authorized) = previous {
            slog::info!(self.logger, "User {} logged out", authorized.account.username);
            self.emit_presence(PresenceEvent::LoggedOut, &authorized.account.username);
        } else {
            slog::debug!(self.logger, "Connection closed");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let previous = std::mem::replace(self.state.get_mut(), SessionState::Closed);
        self.closed(previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AccountStore, MemoryAccountRepository, Pbkdf2Verifier};
    use async_trait::async_trait;
    use ftpgate_core::account::NewAccount;
    use pretty_assertions::assert_eq;
    use std::num::NonZeroU32;
    use tokio::sync::mpsc;

    #[derive(Debug)]
    struct Recorder(mpsc::UnboundedSender<(String, u64)>);

    #[async_trait]
    impl PresenceListener for Recorder {
        async fn receive_presence_event(&self, e: PresenceEvent, m: EventMeta) {
            let _ = self.0.send((format!("{:?} {}", e, m.username), m.sequence_number));
        }
    }

    #[async_trait]
    impl CommandListener for Recorder {
        async fn receive_command_event(&self, e: CommandEvent, m: EventMeta) {
            let _ = self.0.send((format!("{} {} {}", m.username, e.token, e.path), m.sequence_number));
        }
    }

    struct Fixture {
        _home: tempfile::TempDir,
        manager: SessionManager,
        events: mpsc::UnboundedReceiver<(String, u64)>,
    }

    async fn fixture(driver: Option<&str>) -> Fixture {
        let home = tempfile::tempdir().unwrap();
        let store = AccountStore::new(Arc::new(MemoryAccountRepository::new()))
            .verifier(Arc::new(Pbkdf2Verifier::with_iterations(NonZeroU32::new(1000).unwrap())));
        store
            .create(NewAccount {
                username: "alice1234".to_string(),
                password: "longenoughpw".to_string(),
                home_directory: home.path().to_string_lossy().into_owned(),
                quota: 0,
                ratio: 0,
                driver: driver.map(str::to_string),
                permissions: Some(vec!["STOR".to_string(), "RETR".to_string(), "!DELE".to_string()]),
            })
            .await
            .unwrap();
        let (tx, events) = mpsc::unbounded_channel();
        let recorder = Arc::new(Recorder(tx));
        let manager = SessionManager::new(Arc::new(store), Arc::new(DriverFactory::new()))
            .failed_login_delay(Duration::ZERO)
            .notify_presence(recorder.clone())
            .notify_command(recorder);
        Fixture {
            _home: home,
            manager,
            events,
        }
    }

    fn remote() -> SocketAddr {
        "10.1.2.3:40000".parse().unwrap()
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<(String, u64)>) -> (String, u64) {
        tokio::time::timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn commands_before_login_are_not_logged_in() {
        let f = fixture(None).await;
        let session = f.manager.connected(remote());
        assert_eq!(session.intercept(CommandToken::Retr, "a.txt").await, Verdict::NotLoggedIn);
        assert_eq!(session.filesystem_for(CommandToken::Retr, "a.txt").await.unwrap_err(), Verdict::NotLoggedIn);
        assert_eq!(f.manager.connections().len(), 1);
        assert_eq!(f.manager.connections()[0].account, None);
    }

    #[tokio::test]
    async fn authorized_session_follows_policy() {
        let mut f = fixture(None).await;
        let session = f.manager.connected(remote());
        let authorization = session.login("alice1234", "longenoughpw".into()).await.unwrap();
        assert_eq!(authorization.deny_list, vec![CommandToken::Dele]);
        assert_eq!(session.phase().await, SessionPhase::Authorized);
        assert_eq!(next_event(&mut f.events).await, ("LoggedIn alice1234".to_string(), 0));

        assert_eq!(session.intercept(CommandToken::Stor, "/up.txt").await, Verdict::Permitted);
        assert_eq!(next_event(&mut f.events).await, ("alice1234 STOR /up.txt".to_string(), 1));
        assert!(session.filesystem_for(CommandToken::Retr, "/up.txt").await.is_ok());
        assert_eq!(session.filesystem_for(CommandToken::Dele, "/up.txt").await.unwrap_err(), Verdict::Denied);
        assert_eq!(session.intercept(CommandToken::Mkd, "/dir").await, Verdict::Denied);

        let connections = f.manager.connections();
        assert_eq!(connections[0].account.as_ref().map(|a| a.username.as_str()), Some("alice1234"));
    }

    #[tokio::test]
    async fn failed_login_rejects_session() {
        let f = fixture(None).await;
        let session = f.manager.connected(remote());
        assert_eq!(session.login("alice1234", "wrongpassword".into()).await.unwrap_err(), SessionError::InvalidCredentials);
        assert_eq!(session.phase().await, SessionPhase::Rejected);
        assert_eq!(session.login("alice1234", "longenoughpw".into()).await.unwrap_err(), SessionError::Refused);
        assert_eq!(session.intercept(CommandToken::Retr, "a").await, Verdict::NotLoggedIn);
    }

    #[derive(Debug)]
    struct Unresponsive;

    #[async_trait]
    impl Authenticator for Unresponsive {
        async fn authenticate(&self, _username: &str, _creds: &Credentials) -> Result<Account, crate::auth::AuthError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn login_timeout_rejects_session() {
        let manager = SessionManager::new(Arc::new(Unresponsive), Arc::new(DriverFactory::new()))
            .login_timeout(Duration::from_millis(20))
            .failed_login_delay(Duration::ZERO);
        let session = manager.connected(remote());
        let result = tokio::time::timeout(Duration::from_secs(1), session.login("alice1234", "longenoughpw".into())).await;
        assert_eq!(result.unwrap().unwrap_err(), SessionError::InvalidCredentials);
        assert_eq!(session.phase().await, SessionPhase::Rejected);
        assert_eq!(session.intercept(CommandToken::Retr, "a").await, Verdict::NotLoggedIn);
        assert_eq!(manager.connections()[0].account, None);
    }

    #[tokio::test]
    async fn unknown_user_fails_like_wrong_password() {
        let f = fixture(None).await;
        let unknown = f.manager.connected(remote()).login("mallory1", "longenoughpw".into()).await.unwrap_err();
        let wrong = f.manager.connected(remote()).login("alice1234", "wrongpassword".into()).await.unwrap_err();
        assert_eq!(unknown, wrong);
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn second_login_is_refused() {
        let f = fixture(None).await;
        let session = f.manager.connected(remote());
        session.login("alice1234", "longenoughpw".into()).await.unwrap();
        assert_eq!(session.login("alice1234", "longenoughpw".into()).await.unwrap_err(), SessionError::AlreadyLoggedIn);
    }

    #[tokio::test]
    async fn unimplemented_driver_is_a_server_fault() {
        let f = fixture(Some("object-storage")).await;
        let session = f.manager.connected(remote());
        assert_eq!(session.login("alice1234", "longenoughpw".into()).await.unwrap_err(), SessionError::ServerFault);
        assert_eq!(session.phase().await, SessionPhase::Rejected);
        assert_eq!(f.manager.connections()[0].account, None);
    }

    #[tokio::test]
    async fn dropping_the_handle_cleans_up() {
        let mut f = fixture(None).await;
        let session = f.manager.connected(remote());
        session.login("alice1234", "longenoughpw".into()).await.unwrap();
        assert_eq!(next_event(&mut f.events).await.0, "LoggedIn alice1234");
        drop(session);
        assert!(f.manager.connections().is_empty());
        assert_eq!(next_event(&mut f.events).await, ("LoggedOut alice1234".to_string(), 1));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut f = fixture(None).await;
        let session = f.manager.connected(remote());
        session.login("alice1234", "longenoughpw".into()).await.unwrap();
        session.close().await;
        session.close().await;
        assert_eq!(session.phase().await, SessionPhase::Closed);
        drop(session);
        assert_eq!(next_event(&mut f.events).await.0, "LoggedIn alice1234");
        assert_eq!(next_event(&mut f.events).await.0, "LoggedOut alice1234");
        assert!(tokio::time::timeout(Duration::from_millis(50), f.events.recv()).await.is_err());
    }

    #[tokio::test]
    async fn repeated_failures_lock_out() {
        let f = fixture(None).await;
        let manager = f.manager.clone().failed_logins_policy(FailedLoginsPolicy::new(
            2,
            Duration::from_secs(60),
            options::FailedLoginsBlock::UserAndIP,
        ));
        for _ in 0..2 {
            let err = manager.connected(remote()).login("alice1234", "wrongpassword".into()).await.unwrap_err();
            assert_eq!(err, SessionError::InvalidCredentials);
        }
        let err = manager.connected(remote()).login("alice1234", "longenoughpw".into()).await.unwrap_err();
        assert_eq!(err, SessionError::InvalidCredentials);
        let elsewhere: SocketAddr = "10.9.9.9:40000".parse().unwrap();
        assert!(manager.connected(elsewhere).login("alice1234", "longenoughpw".into()).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_logins_on_one_account() {
        let f = fixture(None).await;
        let mut tasks = Vec::new();
        for port in 0..8u16 {
            let manager = f.manager.clone();
            tasks.push(tokio::spawn(async move {
                let session = manager.connected(SocketAddr::from(([10, 0, 0, 1], 50000 + port)));
                let result = session.login("alice1234", "longenoughpw".into()).await.map(|_| ());
                (session, result)
            }));
        }
        let mut sessions = Vec::new();
        for task in tasks {
            let (session, result) = task.await.unwrap();
            assert_eq!(result, Ok(()));
            sessions.push(session);
        }
        let connections = f.manager.connections();
        assert_eq!(connections.len(), 8);
        assert!(connections.iter().all(|c| c.account.is_some()));
        drop(sessions);
        assert!(f.manager.connections().is_empty());
    }
}
