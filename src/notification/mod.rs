//! Allows users to listen to events emitted by sessions.
//!
//! To hear about logins and logouts implement [`PresenceListener`] and register it with
//! [`ServerBuilder::notify_presence`](crate::ServerBuilder::notify_presence). To hear about
//! permitted commands implement [`CommandListener`] and register it with
//! [`ServerBuilder::notify_command`](crate::ServerBuilder::notify_command).
//!
//! Listeners are called on spawned tasks so a slow listener never holds up a session.

pub(crate) mod event;
pub(crate) mod nop;

pub use event::{CommandEvent, CommandListener, EventMeta, PresenceEvent, PresenceListener};
