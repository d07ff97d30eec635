//! Append-only conversation log.

use serde::{Deserialize, Serialize};

use super::message::{ChatMessage, MessageId, MessageKind};

/// The ordered list of chat messages in a conversation.
///
/// Messages are append-only; insertion order is display order. The only
/// removal supported is by id, used to retire a transient "drawing..." or
/// "loading..." placeholder once the real response (or an error) arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationLog {
    messages: Vec<ChatMessage>,
    next_id: MessageId,
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationLog {
    /// Creates an empty conversation log.
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            next_id: 1,
        }
    }

    /// Appends a message and returns its assigned id.
    pub fn append(&mut self, kind: MessageKind) -> MessageId {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id,
            kind,
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
        id
    }

    /// Removes the message with the given id.
    ///
    /// Returns `true` if a message was removed. Ids are never reused, so a
    /// repeated remove of the same id is a no-op.
    pub fn remove(&mut self, id: MessageId) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.id != id);
        self.messages.len() != before
    }

    /// All messages in insertion order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Messages appended after the given id, in insertion order.
    pub fn since(&self, id: MessageId) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(move |m| m.id > id)
    }

    /// Id of the most recently appended message still in the log.
    pub fn last_id(&self) -> Option<MessageId> {
        self.messages.last().map(|m| m.id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
