//! Selects and constructs the storage driver a session's files are served from.

use crate::BoxError;
use async_trait::async_trait;
use ftpgate_core::{account::Account, account::DriverKind, storage::FilesystemAdapter};
use ftpgate_sbe_fs::Filesystem;
use slog::Drain;
use std::{collections::HashMap, fmt, path::PathBuf, sync::Arc};
use thiserror::Error;

/// Errors from [`DriverFactory::create`].
#[derive(Debug, Error)]
pub enum DriverError {
    /// No builder is registered for the kind.
    #[error("driver '{0}' is not implemented")]
    NotImplemented(DriverKind),
    /// The builder failed to open the account's storage.
    #[error("could not open {kind} storage for '{username}'")]
    Backend {
        /// The driver kind
        kind: DriverKind,
        /// The account
        username: String,
        /// What went wrong
        #[source]
        source: BoxError,
    },
}

impl DriverError {
    /// Wraps a builder failure for `account`.
    pub fn backend<E: Into<BoxError>>(kind: DriverKind, account: &Account, error: E) -> Self {
        DriverError::Backend {
            kind,
            username: account.username.clone(),
            source: error.into(),
        }
    }
}

/// Constructs the filesystem adapter for one kind of driver.
#[async_trait]
pub trait DriverBuilder: Send + Sync {
    /// Opens `account`'s storage.
    async fn build(&self, account: &Account) -> Result<Arc<dyn FilesystemAdapter>, DriverError>;
}

#[async_trait]
impl<F> DriverBuilder for F
where
    F: Fn(&Account) -> Result<Arc<dyn FilesystemAdapter>, DriverError> + Send + Sync,
{
    async fn build(&self, account: &Account) -> Result<Arc<dyn FilesystemAdapter>, DriverError> {
        self(account)
    }
}

/// Serves files from the account's home directory on local disk. The directory is created when
/// missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDriver;

#[async_trait]
impl DriverBuilder for LocalDriver {
    async fn build(&self, account: &Account) -> Result<Arc<dyn FilesystemAdapter>, DriverError> {
        let home = PathBuf::from(&account.home_directory);
        tokio::fs::create_dir_all(&home)
            .await
            .map_err(|e| DriverError::backend(DriverKind::Local, account, e))?;
        let fs = tokio::task::spawn_blocking(move || Filesystem::new(home))
            .await
            .map_err(|e| DriverError::backend(DriverKind::Local, account, e))?
            .map_err(|e| DriverError::backend(DriverKind::Local, account, e))?;
        Ok(Arc::new(fs))
    }
}

/// Maps driver kinds to builders.
///
/// Only [`DriverKind::Local`] is registered by default. Object storage and VCS drivers report
/// [`DriverError::NotImplemented`] until a builder is registered for them. Kinds this build does
/// not know fall back to local.
pub struct DriverFactory {
    builders: HashMap<DriverKind, Arc<dyn DriverBuilder>>,
    logger: slog::Logger,
}

impl fmt::Debug for DriverFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.builders.keys().map(DriverKind::name).collect();
        kinds.sort_unstable();
        f.debug_struct("DriverFactory").field("kinds", &kinds).finish()
    }
}

impl Default for DriverFactory {
    fn default() -> Self {
        DriverFactory::new()
    }
}

impl DriverFactory {
    /// A factory with the local driver registered.
    pub fn new() -> Self {
        DriverFactory {
            builders: HashMap::new(),
            logger: slog::Logger::root(slog_stdlog::StdLog.fuse(), slog::o!()),
        }
        .register(DriverKind::Local, LocalDriver)
    }

    /// Registers `builder` for `kind`, replacing any earlier one. Registering for an unknown kind
    /// has no effect since those always fall back to local.
    pub fn register<B: DriverBuilder + 'static>(mut self, kind: DriverKind, builder: B) -> Self {
        if !matches!(kind, DriverKind::Unknown(_)) {
            self.builders.insert(kind, Arc::new(builder));
        }
        self
    }

    /// Sets the logger.
    pub fn logger(mut self, logger: slog::Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Creates the adapter of kind `kind` for `account`.
    pub async fn create(&self, kind: &DriverKind, account: &Account) -> Result<Arc<dyn FilesystemAdapter>, DriverError> {
        let kind = match kind {
            DriverKind::Unknown(name) => {
                slog::warn!(self.logger, "Unknown driver, falling back to local"; "driver" => name, "username" => &account.username);
                &DriverKind::Local
            }
            known => known,
        };
        match self.builders.get(kind) {
            Some(builder) => builder.build(account).await,
            None => Err(DriverError::NotImplemented(kind.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftpgate_core::{account::PasswordSecret, command::Permission};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn account(home: &Path, driver: DriverKind) -> Account {
        Account {
            id: uuid::Uuid::new_v4(),
            username: "alice1234".to_string(),
            secret: PasswordSecret::Plaintext {
                password: "longenoughpw".to_string(),
            },
            home_directory: home.to_string_lossy().into_owned(),
            quota: 0,
            ratio: 0,
            driver,
            permissions: Permission::defaults(),
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn local_is_rooted_at_home() {
        let dir = tempfile::tempdir().unwrap();
        let account = account(dir.path(), DriverKind::Local);
        let fs = DriverFactory::new().create(&account.driver, &account).await.unwrap();
        assert_eq!(fs.root(), dir.path());
    }

    #[tokio::test]
    async fn local_creates_missing_home() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("nested/home");
        let account = account(&home, DriverKind::Local);
        DriverFactory::new().create(&account.driver, &account).await.unwrap();
        assert!(home.is_dir());
    }

    #[tokio::test]
    async fn unknown_kind_falls_back_to_local() {
        let dir = tempfile::tempdir().unwrap();
        let account = account(dir.path(), DriverKind::Unknown("tape".to_string()));
        let fs = DriverFactory::new().create(&account.driver, &account).await.unwrap();
        assert_eq!(fs.root(), dir.path());
    }

    #[tokio::test]
    async fn unregistered_kinds_are_not_implemented() {
        let dir = tempfile::tempdir().unwrap();
        for kind in [DriverKind::ObjectStorage, DriverKind::Vcs] {
            let account = account(dir.path(), kind.clone());
            match DriverFactory::new().create(&kind, &account).await {
                Err(DriverError::NotImplemented(k)) => assert_eq!(k, kind),
                Err(e) => panic!("unexpected error {e}"),
                Ok(_) => panic!("expected {kind} to be unimplemented"),
            }
        }
    }

    #[tokio::test]
    async fn registered_builder_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let factory = DriverFactory::new().register(
            DriverKind::ObjectStorage,
            move |account: &Account| -> Result<Arc<dyn FilesystemAdapter>, DriverError> {
                let fs = Filesystem::new(&root).map_err(|e| DriverError::backend(DriverKind::ObjectStorage, account, e))?;
                Ok(Arc::new(fs))
            },
        );
        let account = account(Path::new("/nonexistent"), DriverKind::ObjectStorage);
        let fs = factory.create(&account.driver, &account).await.unwrap();
        assert_eq!(fs.root(), dir.path());
    }
}
