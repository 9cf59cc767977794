//! The seam sessions authenticate through.

use super::password::Password;
use crate::BoxError;
use async_trait::async_trait;
use ftpgate_core::{account::Account, account::ValidationError, repository::RepositoryError};
use std::{
    fmt::Debug,
    net::{IpAddr, Ipv4Addr},
};
use thiserror::Error;

/// Verifies a username and credentials, yielding the account they belong to.
#[async_trait]
pub trait Authenticator: Sync + Send + Debug {
    /// Authenticate `username` with the given credentials.
    async fn authenticate(&self, username: &str, creds: &Credentials) -> Result<Account, AuthError>;
}

/// What a client presented when logging in.
#[derive(Clone, Debug)]
pub struct Credentials {
    /// The password, if one was sent
    pub password: Option<Password>,
    /// The address the client connects from
    pub source_ip: IpAddr,
}

impl From<&str> for Credentials {
    fn from(s: &str) -> Self {
        Credentials {
            password: Some(Password::from(s)),
            source_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }
}

/// Errors from the account store. [`AuthError::InvalidCredentials`] is deliberately the same for
/// an unknown user and a wrong password.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown user or wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// The provisioning reference does not resolve.
    #[error("Invalid provision")]
    InvalidProvision,
    /// The username is taken.
    #[error("User already exists")]
    AccountExists,
    /// An update named an account that does not exist.
    #[error("User not found")]
    AccountNotFound,
    /// The input failed a schema rule.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The store or one of its collaborators failed.
    #[error("server fault")]
    ServerFault(#[source] BoxError),
}

impl AuthError {
    /// A stable code for the error, for callers that report errors as data.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::InvalidProvision => "INVALID_PROVISION",
            AuthError::AccountExists => "USER_EXISTS",
            AuthError::AccountNotFound => "USER_NOT_FOUND",
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::ServerFault(_) => "SERVER_FAULT",
        }
    }
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict { .. } => AuthError::AccountExists,
            RepositoryError::NotFound { .. } => AuthError::AccountNotFound,
            RepositoryError::Backend(source) => AuthError::ServerFault(source),
        }
    }
}
