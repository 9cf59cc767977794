//! Contains the [`ServerController`] that starts and stops the FTP server, and the sessions it
//! hands to the protocol engine.

mod controller;
pub(crate) mod engine;
pub(crate) mod error;
mod failed_logins;
mod listen;
mod registry;
pub(crate) mod session;
mod shutdown;

pub use controller::{PassiveRange, ServerBuilder, ServerController, ServerState, StatusReport};
pub use engine::{EngineConfig, EngineError, EngineFactory, ProtocolEngine};
pub use error::ServerError;
pub use registry::ConnectionInfo;
pub use session::{Authorization, SessionError, SessionHandle, SessionManager, SessionPhase};
