//! Persistence seams for accounts and provisioning records.

use crate::{BoxError, account::Account};
use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;

/// Errors an [`AccountRepository`] or [`ProvisionResolver`] may return.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// An account with this username already exists.
    #[error("account '{username}' already exists")]
    Conflict {
        /// The clashing name
        username: String,
    },
    /// No account with this username exists.
    #[error("account '{username}' not found")]
    NotFound {
        /// The missing name
        username: String,
    },
    /// The backing store failed.
    #[error("repository backend error")]
    Backend(#[source] BoxError),
}

impl RepositoryError {
    /// Wraps a backend failure.
    pub fn backend<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        RepositoryError::Backend(error.into())
    }
}

/// The account store's persistence. Usernames are unique within a repository.
#[async_trait]
pub trait AccountRepository: Send + Sync + Debug {
    /// Looks up the account named `username`. Absence is `Ok(None)`, not an error.
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError>;

    /// Persists a new account. Fails with [`RepositoryError::Conflict`] if the name is taken.
    async fn create(&self, account: Account) -> Result<Account, RepositoryError>;

    /// Replaces an existing account, matched by username. Fails with [`RepositoryError::NotFound`]
    /// if there is none.
    async fn update(&self, account: Account) -> Result<Account, RepositoryError>;
}

/// A pre-authorised account creation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provision {
    /// Identifier handed to the user
    pub id: String,
    /// Path below the provisioning root the account's home directory will be
    pub path: String,
}

/// Looks up provisioning records by id.
#[async_trait]
pub trait ProvisionResolver: Send + Sync + Debug {
    /// Returns the provision with the given id, if any.
    async fn resolve(&self, id: &str) -> Result<Option<Provision>, RepositoryError>;
}
