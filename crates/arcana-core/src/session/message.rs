//! Chat message types.
//!
//! This module contains types for representing messages in a conversation,
//! including the tagged message kinds and the card payload attached to
//! card bubbles.

use serde::{Deserialize, Serialize};

/// Identifier of a chat message, unique and monotonic within a conversation.
pub type MessageId = u64;

/// The card shown in a card bubble.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPayload {
    /// Card name as reported by the backend (e.g. "The Hermit").
    pub name: String,
    /// Image reference: a data URL or a server-relative path.
    pub image: String,
}

/// The kind of a chat bubble, together with its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MessageKind {
    /// Text typed by the user.
    User(String),
    /// Text spoken by the reading (interpretations, prompts, errors).
    Ai(String),
    /// A drawn card.
    Card(CardPayload),
    /// An uploaded image, by reference.
    Image(String),
}

impl MessageKind {
    /// Returns the displayable text of the message: the body for user/ai
    /// bubbles, the card name for card bubbles, the reference for images.
    pub fn text(&self) -> &str {
        match self {
            MessageKind::User(content) | MessageKind::Ai(content) => content,
            MessageKind::Card(card) => &card.name,
            MessageKind::Image(reference) => reference,
        }
    }
}

/// A single message in a conversation.
///
/// Each message has a log-assigned id, a kind carrying its content,
/// and a timestamp indicating when it was appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Log-assigned identifier, monotonic in insertion order.
    pub id: MessageId,
    /// The kind and content of the message.
    pub kind: MessageKind,
    /// Timestamp when the message was appended (ISO 8601 format).
    pub timestamp: String,
}
