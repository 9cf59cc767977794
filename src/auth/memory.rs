//! In-memory [`AccountRepository`] and [`ProvisionResolver`].

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use ftpgate_core::{
    account::Account,
    repository::{AccountRepository, Provision, ProvisionResolver, RepositoryError},
};

/// Accounts held in a concurrent map. Creating an existing username is a conflict, decided
/// atomically per entry, so of two concurrent creates exactly one wins.
#[derive(Debug, Default)]
pub struct MemoryAccountRepository {
    accounts: DashMap<String, Account>,
}

impl MemoryAccountRepository {
    /// An empty repository.
    pub fn new() -> Self {
        MemoryAccountRepository::default()
    }

    /// A repository holding `accounts`. Later duplicates replace earlier ones.
    pub fn with_accounts<I: IntoIterator<Item = Account>>(accounts: I) -> Self {
        MemoryAccountRepository {
            accounts: accounts.into_iter().map(|a| (a.username.clone(), a)).collect(),
        }
    }

    /// Number of stored accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether there are no accounts.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError> {
        Ok(self.accounts.get(username).map(|entry| entry.value().clone()))
    }

    async fn create(&self, account: Account) -> Result<Account, RepositoryError> {
        match self.accounts.entry(account.username.clone()) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict { username: account.username }),
            Entry::Vacant(slot) => {
                slot.insert(account.clone());
                Ok(account)
            }
        }
    }

    async fn update(&self, account: Account) -> Result<Account, RepositoryError> {
        match self.accounts.get_mut(&account.username) {
            Some(mut entry) => {
                *entry = account.clone();
                Ok(account)
            }
            None => Err(RepositoryError::NotFound { username: account.username }),
        }
    }
}

/// Provisioning records held in memory.
#[derive(Debug, Default)]
pub struct MemoryProvisions {
    provisions: DashMap<String, Provision>,
}

impl MemoryProvisions {
    /// An empty table.
    pub fn new() -> Self {
        MemoryProvisions::default()
    }

    /// Adds or replaces the provision `id`.
    pub fn insert(&self, id: impl Into<String>, path: impl Into<String>) {
        let id = id.into();
        self.provisions.insert(id.clone(), Provision { id, path: path.into() });
    }
}

#[async_trait]
impl ProvisionResolver for MemoryProvisions {
    async fn resolve(&self, id: &str) -> Result<Option<Provision>, RepositoryError> {
        Ok(self.provisions.get(id).map(|entry| entry.value().clone()))
    }
}
