//! Append-only chat timeline.
//!
//! Messages are only ever appended in arrival order. Nothing removes or
//! reorders individual entries; the only destructive operation is
//! clearing the whole timeline when the owning session ends.

use crate::message::{Message, MessageId, VoiceMessage};

/// Ordered store of every message exchanged during a session.
#[derive(Debug, Default)]
pub struct Timeline {
    messages: Vec<Message>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message at the end of the timeline.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages in arrival order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Looks up a message by id.
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id() == id)
    }

    /// Looks up a voice message by id, ignoring text entries.
    pub fn voice(&self, id: MessageId) -> Option<&VoiceMessage> {
        self.messages.iter().find_map(|m| match m {
            Message::Voice(v) if v.id == id => Some(v),
            _ => None,
        })
    }

    /// Empties the timeline. The only way entries ever leave; used when
    /// the owning session shuts down.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
