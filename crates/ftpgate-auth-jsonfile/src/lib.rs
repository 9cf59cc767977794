//! [`AccountRepository`] and [`ProvisionResolver`] implementations backed by JSON files.
//!
//! The accounts file holds an array of account records. Credentials are stored either as a
//! PBKDF2 triple or, for records written by older tooling, as a plain `password`:
//!
//! ```json
//! [
//!   {
//!     "username": "testuser1",
//!     "pbkdf2_salt": "testuser1.acme.com",
//!     "pbkdf2_key": "<<BASE_64_KDF>>",
//!     "pbkdf2_iter": 500000,
//!     "homedir": "/mnt/acme",
//!     "permissions": ["RETR", "LIST", "!STOR"]
//!   }
//! ]
//! ```
//!
//! Accounts created or updated through the repository are written back to the file they were
//! loaded from.
//!
//! [`AccountRepository`]: ftpgate_core::repository::AccountRepository
//! [`ProvisionResolver`]: ftpgate_core::repository::ProvisionResolver

use async_trait::async_trait;
use ftpgate_core::{
    account::{Account, PasswordSecret},
    repository::{AccountRepository, Provision, ProvisionResolver, RepositoryError},
};
use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fs,
    path::{Path, PathBuf},
};
use tokio::sync::RwLock;

type LoadError = Box<dyn std::error::Error + Send + Sync>;

/// Accounts kept in memory and persisted to a JSON file.
#[derive(Debug)]
pub struct JsonFileAccountRepository {
    accounts: RwLock<BTreeMap<String, Account>>,
    path: Option<PathBuf>,
}

impl JsonFileAccountRepository {
    /// Loads the accounts in `filename`. Changes are written back to it.
    pub fn from_file<P: AsRef<Path>>(filename: P) -> Result<Self, LoadError> {
        let json = fs::read_to_string(filename.as_ref())?;
        let mut repository = JsonFileAccountRepository::from_json(json)?;
        repository.path = Some(filename.as_ref().to_path_buf());
        Ok(repository)
    }

    /// Loads accounts from a JSON string. Changes are kept in memory only.
    pub fn from_json<T: Into<String>>(json: T) -> Result<Self, LoadError> {
        let records: Vec<Account> = serde_json::from_str(&json.into())?;

        let names: BTreeSet<&str> = records.iter().map(|a| a.username.as_str()).collect();
        if names.len() != records.len() {
            return Err(Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, "duplicate usernames")));
        }
        let salts: Vec<&str> = records
            .iter()
            .filter_map(|a| match &a.secret {
                PasswordSecret::Pbkdf2 { pbkdf2_salt, .. } => Some(pbkdf2_salt.as_str()),
                PasswordSecret::Plaintext { .. } => None,
            })
            .collect();
        if salts.iter().collect::<BTreeSet<_>>().len() != salts.len() {
            return Err(Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, "pbkdf2 salts must be unique")));
        }

        Ok(JsonFileAccountRepository {
            accounts: RwLock::new(records.into_iter().map(|a| (a.username.clone(), a)).collect()),
            path: None,
        })
    }

    async fn persist(&self, accounts: &BTreeMap<String, Account>) -> Result<(), RepositoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let records: Vec<&Account> = accounts.values().collect();
        let json = serde_json::to_vec_pretty(&records).map_err(RepositoryError::backend)?;
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, json).await.map_err(RepositoryError::backend)?;
        tokio::fs::rename(&staging, path).await.map_err(RepositoryError::backend)
    }
}

#[async_trait]
impl AccountRepository for JsonFileAccountRepository {
    #[tracing_attributes::instrument(skip(self))]
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError> {
        Ok(self.accounts.read().await.get(username).cloned())
    }

    #[tracing_attributes::instrument(skip(self, account), fields(username = %account.username))]
    async fn create(&self, account: Account) -> Result<Account, RepositoryError> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.username) {
            return Err(RepositoryError::Conflict { username: account.username });
        }
        accounts.insert(account.username.clone(), account.clone());
        if let Err(e) = self.persist(&accounts).await {
            accounts.remove(&account.username);
            return Err(e);
        }
        Ok(account)
    }

    #[tracing_attributes::instrument(skip(self, account), fields(username = %account.username))]
    async fn update(&self, account: Account) -> Result<Account, RepositoryError> {
        let mut accounts = self.accounts.write().await;
        let Some(slot) = accounts.get_mut(&account.username) else {
            return Err(RepositoryError::NotFound { username: account.username });
        };
        let previous = std::mem::replace(slot, account.clone());
        if let Err(e) = self.persist(&accounts).await {
            accounts.insert(previous.username.clone(), previous);
            return Err(e);
        }
        Ok(account)
    }
}

#[derive(Deserialize)]
struct ProvisionRecord {
    id: String,
    path: String,
}

/// Provisioning records read from a JSON array of `{"id": .., "path": ..}` objects.
#[derive(Debug, Clone, Default)]
pub struct JsonFileProvisions {
    provisions: HashMap<String, Provision>,
}

impl JsonFileProvisions {
    /// Loads the provisions in `filename`.
    pub fn from_file<P: AsRef<Path>>(filename: P) -> Result<Self, LoadError> {
        JsonFileProvisions::from_json(fs::read_to_string(filename)?)
    }

    /// Loads provisions from a JSON string.
    pub fn from_json<T: Into<String>>(json: T) -> Result<Self, LoadError> {
        let records: Vec<ProvisionRecord> = serde_json::from_str(&json.into())?;
        Ok(JsonFileProvisions {
            provisions: records
                .into_iter()
                .map(|r| (r.id.clone(), Provision { id: r.id, path: r.path }))
                .collect(),
        })
    }
}

#[async_trait]
impl ProvisionResolver for JsonFileProvisions {
    async fn resolve(&self, id: &str) -> Result<Option<Provision>, RepositoryError> {
        Ok(self.provisions.get(id).cloned())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ftpgate_core::account::DriverKind;
    use pretty_assertions::assert_eq;

    const ACCOUNTS: &str = r#"[
  {
    "username": "alice",
    "pbkdf2_salt": "salt",
    "pbkdf2_key": "Egbi+LYfwn00V+HwFq146kmhoE4TYaqPFCA7mKkfzEpSZe2zMqXz/8LfA7HjYvXgiLzOuDij2wf50eKcWOcjYQ==",
    "pbkdf2_iter": 5000,
    "homedir": "/mnt/alice"
  },
  {
    "username": "carol",
    "password": "plainpassword",
    "homedir": "/mnt/carol",
    "driver": "git"
  }
]"#;

    #[tokio::test]
    async fn finds_loaded_accounts() {
        let repo = JsonFileAccountRepository::from_json(ACCOUNTS).unwrap();
        let carol = repo.find_by_username("carol").await.unwrap().unwrap();
        assert_eq!(carol.driver, DriverKind::Vcs);
        assert!(repo.find_by_username("mallory").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_conflicts_on_existing_name() {
        let repo = JsonFileAccountRepository::from_json(ACCOUNTS).unwrap();
        let alice = repo.find_by_username("alice").await.unwrap().unwrap();
        match repo.create(alice).await {
            Err(RepositoryError::Conflict { username }) => assert_eq!(username, "alice"),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_requires_existing_account() {
        let repo = JsonFileAccountRepository::from_json(ACCOUNTS).unwrap();
        let mut ghost = repo.find_by_username("alice").await.unwrap().unwrap();
        ghost.username = "ghost".to_string();
        assert!(matches!(repo.update(ghost).await, Err(RepositoryError::NotFound { .. })));
        assert!(repo.find_by_username("ghost").await.unwrap().is_none());
    }

    #[test]
    fn usernames_have_to_be_unique() {
        let json = r#"[
  {"username": "alice", "password": "plainpassword", "homedir": "/a"},
  {"username": "alice", "password": "otherpassword", "homedir": "/b"}
]"#;
        assert!(JsonFileAccountRepository::from_json(json).is_err());
    }

    #[test]
    fn salts_have_to_be_unique() {
        let json = r#"[
  {"username": "alice", "pbkdf2_salt": "salt", "pbkdf2_key": "a2V5", "pbkdf2_iter": 5000, "homedir": "/a"},
  {"username": "bella", "pbkdf2_salt": "salt", "pbkdf2_key": "a2V5", "pbkdf2_iter": 5000, "homedir": "/b"}
]"#;
        assert!(JsonFileAccountRepository::from_json(json).is_err());
    }

    #[tokio::test]
    async fn provisions_resolve_by_id() {
        let provisions = JsonFileProvisions::from_json(r#"[{"id": "p1", "path": "acme"}]"#).unwrap();
        assert_eq!(
            provisions.resolve("p1").await.unwrap(),
            Some(Provision {
                id: "p1".to_string(),
                path: "acme".to_string()
            })
        );
        assert_eq!(provisions.resolve("p2").await.unwrap(), None);
    }
}
