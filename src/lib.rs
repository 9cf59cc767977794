//! ftpgate is the control plane of a multi-tenant FTP gateway.
//!
//! It authenticates FTP users against persisted accounts, decides per account which FTP commands
//! may be issued, selects the storage driver each account's files are served from, obtains TLS
//! certificates for the served hostname and manages the lifecycle of the server: start, stop,
//! restart, status and a listing of live sessions.
//!
//! The FTP wire protocol itself is spoken by a [`ProtocolEngine`] that the
//! [`ServerController`] builds on start and hands every accepted connection, together with a
//! [`SessionHandle`] the engine logs in and authorizes commands through.
//!
//! # Quick Start
//!
//! ```no_run
//! use ftpgate::{Config, ServerController, auth::{AccountStore, MemoryAccountRepository}};
//! use std::sync::Arc;
//!
//! # fn my_engine(config: ftpgate::EngineConfig) -> Result<Arc<dyn ftpgate::ProtocolEngine>, ftpgate::EngineError> { unimplemented!() }
//! #[tokio::main]
//! pub async fn main() {
//!     let config = Config::from_file("/etc/ftpgate.json").unwrap();
//!     let store = AccountStore::new(Arc::new(MemoryAccountRepository::new())).provision_root(&config.provision_root);
//!     let server = ServerController::builder(config, Arc::new(store), my_engine)
//!         .metrics()
//!         .build()
//!         .unwrap();
//!     server.start().await.unwrap();
//! }
//! ```

pub mod auth;
pub(crate) mod config;
pub mod control;
pub mod driver;
pub(crate) mod metrics;
pub mod notification;
pub mod options;
pub mod policy;
pub(crate) mod server;
pub mod tls;

pub use crate::config::{Config, ConfigError};
pub use crate::server::{
    Authorization, ConnectionInfo, EngineConfig, EngineError, EngineFactory, PassiveRange, ProtocolEngine, ServerBuilder, ServerController,
    ServerError, ServerState, SessionError, SessionHandle, SessionManager, SessionPhase, StatusReport,
};
pub use ftpgate_core::{account, command, repository, storage};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
