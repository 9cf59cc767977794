use super::{
    authenticator::{AuthError, Authenticator, Credentials},
    memory::MemoryProvisions,
    password::Password,
    secret::{Pbkdf2Verifier, SecretVerifier},
};
use crate::options::DEFAULT_PROVISION_ROOT;
use async_trait::async_trait;
use ftpgate_core::{
    account::{Account, NewAccount, schema},
    repository::{AccountRepository, ProvisionResolver},
};
use slog::Drain;
use std::{
    fmt,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

/// Verifies credentials against persisted accounts and creates new accounts.
///
/// The store is the [`Authenticator`] sessions log in through. Password comparison and sealing run
/// on the blocking thread pool so that slow key derivation never stalls other sessions.
pub struct AccountStore {
    repository: Arc<dyn AccountRepository>,
    provisions: Arc<dyn ProvisionResolver>,
    verifier: Arc<dyn SecretVerifier>,
    provision_root: PathBuf,
    logger: slog::Logger,
}

impl fmt::Debug for AccountStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountStore")
            .field("repository", &self.repository)
            .field("provisions", &self.provisions)
            .field("verifier", &self.verifier)
            .field("provision_root", &self.provision_root)
            .finish()
    }
}

async fn blocking<F, T>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| AuthError::ServerFault(Box::new(e)))
}

impl AccountStore {
    /// A store over `repository`, with no provisions, the default PBKDF2 verifier and `/mnt` as
    /// the provisioning root.
    pub fn new(repository: Arc<dyn AccountRepository>) -> Self {
        AccountStore {
            repository,
            provisions: Arc::new(MemoryProvisions::new()),
            verifier: Arc::new(Pbkdf2Verifier::default()),
            provision_root: PathBuf::from(DEFAULT_PROVISION_ROOT),
            logger: slog::Logger::root(slog_stdlog::StdLog.fuse(), slog::o!()),
        }
    }

    /// Sets where provisioning references are resolved.
    pub fn provisions(mut self, provisions: Arc<dyn ProvisionResolver>) -> Self {
        self.provisions = provisions;
        self
    }

    /// Sets how secrets are compared and sealed.
    pub fn verifier(mut self, verifier: Arc<dyn SecretVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Sets the directory provisioned home directories are placed under.
    pub fn provision_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.provision_root = root.into();
        self
    }

    /// Sets the logger.
    pub fn logger(mut self, logger: slog::Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Returns the account for `username` if `password` matches its secret.
    ///
    /// An unknown user and a wrong password both give [`AuthError::InvalidCredentials`]; only the
    /// debug log tells them apart.
    pub async fn login(&self, username: &str, password: &Password) -> Result<Account, AuthError> {
        let within_bounds = password
            .as_str()
            .is_some_and(|p| schema::LOGIN_USERNAME.check(username).is_ok() && schema::PASSWORD.check(p).is_ok());
        if !within_bounds {
            slog::debug!(self.logger, "Login rejected: input out of bounds"; "username" => username);
            return Err(AuthError::InvalidCredentials);
        }

        let account = self.repository.find_by_username(username).await?;
        // Unknown users are compared against a decoy so both rejections cost the same.
        let secret = match &account {
            Some(account) => account.secret.clone(),
            None => self.verifier.decoy(),
        };
        let verifier = self.verifier.clone();
        let supplied = password.clone();
        let matches = blocking(move || verifier.compare(supplied.as_ref(), &secret)).await?;

        match account {
            Some(account) if matches => Ok(account),
            Some(_) => {
                slog::debug!(self.logger, "Login rejected: wrong password"; "username" => username);
                Err(AuthError::InvalidCredentials)
            }
            None => {
                slog::debug!(self.logger, "Login rejected: unknown user"; "username" => username);
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Looks up an account by exact username.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<Account>, AuthError> {
        Ok(self.repository.find_by_username(username).await?)
    }

    /// Creates an account from a provisioning record. Its home directory is the provision's path
    /// below the provisioning root; quota and ratio are zero, the driver is local and every command
    /// is allowed.
    pub async fn create_from_provision(&self, username: &str, password: &str, provision_id: &str) -> Result<Account, AuthError> {
        let Some(provision) = self.provisions.resolve(provision_id).await? else {
            return Err(AuthError::InvalidProvision);
        };
        let relative = Path::new(provision.path.trim_start_matches('/'));
        if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
            slog::warn!(self.logger, "Provision path escapes the provisioning root";
                "provision" => provision_id, "path" => &provision.path);
            return Err(AuthError::InvalidProvision);
        }
        if self.repository.find_by_username(username).await?.is_some() {
            return Err(AuthError::AccountExists);
        }

        let home = self.provision_root.join(relative);
        let new = NewAccount {
            username: username.to_string(),
            password: password.to_string(),
            home_directory: home.to_string_lossy().into_owned(),
            quota: 0,
            ratio: 0,
            driver: None,
            permissions: None,
        };
        let account = self.create(new).await?;
        slog::info!(self.logger, "Account created from provision"; "username" => &account.username, "provision" => provision_id);
        Ok(account)
    }

    /// Validates and stores a new account. The password is sealed before it is stored.
    pub async fn create(&self, new: NewAccount) -> Result<Account, AuthError> {
        let validated = new.validate()?;
        let verifier = self.verifier.clone();
        let password = validated.password().to_string();
        let secret = blocking(move || verifier.seal(&password))
            .await?
            .map_err(|e| AuthError::ServerFault(Box::new(e)))?;
        Ok(self.repository.create(validated.into_account(secret)).await?)
    }

    /// Validates and replaces an existing account.
    pub async fn update(&self, account: Account) -> Result<Account, AuthError> {
        account.validate()?;
        Ok(self.repository.update(account).await?)
    }
}

#[async_trait]
impl Authenticator for AccountStore {
    async fn authenticate(&self, username: &str, creds: &Credentials) -> Result<Account, AuthError> {
        match &creds.password {
            Some(password) => self.login(username, password).await,
            None => Err(AuthError::InvalidCredentials),
        }
    }
}
