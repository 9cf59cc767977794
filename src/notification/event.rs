use async_trait::async_trait;
use ftpgate_core::command::CommandToken;
use std::fmt::Debug;
use std::sync::Arc;

/// An event pertaining to a client's login and logout, allowing detection of the presence of a
/// client. To identify the corresponding user or session see [`EventMeta`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// The user logged in successfully
    LoggedIn,
    /// The user's session closed
    LoggedOut,
}

/// A command an authorised session was permitted to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEvent {
    /// The command
    pub token: CommandToken,
    /// The path argument as the client sent it
    pub path: String,
}

/// Identifies the user and session an event happened in. The sequence number orders the events of
/// one session for systems where delivery order is not guaranteed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMeta {
    /// The user this event pertains to. A user may have more than one session.
    pub username: String,
    /// Identifies a single session.
    pub trace_id: String,
    /// Incremented per event, per session.
    pub sequence_number: u64,
}

/// A listener for [`CommandEvent`]s.
#[async_trait]
pub trait CommandListener: Sync + Send + Debug {
    /// Called after a command was permitted.
    async fn receive_command_event(&self, e: CommandEvent, m: EventMeta);
}

/// A listener for [`PresenceEvent`]s.
#[async_trait]
pub trait PresenceListener: Sync + Send + Debug {
    /// Called after the login or logout happened.
    async fn receive_presence_event(&self, e: PresenceEvent, m: EventMeta);
}

#[async_trait]
impl CommandListener for Arc<dyn CommandListener> {
    async fn receive_command_event(&self, e: CommandEvent, m: EventMeta) {
        self.as_ref().receive_command_event(e, m).await
    }
}

#[async_trait]
impl PresenceListener for Arc<dyn PresenceListener> {
    async fn receive_presence_event(&self, e: PresenceEvent, m: EventMeta) {
        self.as_ref().receive_presence_event(e, m).await
    }
}
