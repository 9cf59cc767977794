use super::event::{CommandEvent, CommandListener, EventMeta, PresenceEvent, PresenceListener};
use async_trait::async_trait;

// An event listener that does nothing. The default for both listener kinds.
#[derive(Debug)]
pub struct NopListener {}

#[async_trait]
impl CommandListener for NopListener {
    async fn receive_command_event(&self, _: CommandEvent, _: EventMeta) {}
}

#[async_trait]
impl PresenceListener for NopListener {
    async fn receive_presence_event(&self, _: PresenceEvent, _: EventMeta) {}
}
