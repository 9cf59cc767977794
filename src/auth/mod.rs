//! Account authentication and management.
//!
//! [`AccountStore`] checks credentials against an
//! [`AccountRepository`](ftpgate_core::repository::AccountRepository) and creates accounts, either
//! directly or from a provisioning record. It implements [`Authenticator`], which is what sessions
//! log in through. Secrets are compared and sealed by a [`SecretVerifier`].
//!
//! ```
//! use ftpgate::auth::{AccountStore, MemoryAccountRepository, MemoryProvisions};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let provisions = MemoryProvisions::new();
//! provisions.insert("welcome-pack", "acme");
//! let store = AccountStore::new(Arc::new(MemoryAccountRepository::new())).provisions(Arc::new(provisions));
//!
//! let account = store.create_from_provision("alice1234", "longenoughpw", "welcome-pack").await.unwrap();
//! assert_eq!(account.home_directory, "/mnt/acme");
//! store.login("alice1234", &"longenoughpw".into()).await.unwrap();
//! # });
//! ```

pub(crate) mod authenticator;
pub(crate) mod memory;
pub(crate) mod password;
pub(crate) mod secret;
mod store;

pub use authenticator::{AuthError, Authenticator, Credentials};
pub use memory::{MemoryAccountRepository, MemoryProvisions};
pub use password::Password;
pub use secret::{Pbkdf2Verifier, SealError, SecretVerifier};
pub use store::AccountStore;
