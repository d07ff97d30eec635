//! Session domain module.
//!
//! This module contains the conversation log and the reading session
//! state machine that drives the draw -> reflection -> interpretation flow.
//!
//! # Module Structure
//!
//! - `message`: Chat message types (`MessageKind`, `ChatMessage`, `CardPayload`)
//! - `conversation`: Append-only conversation log (`ConversationLog`)
//! - `model`: Reading session state (`ReadingPhase`, `DrawnCard`, `ReadingSession`)

mod conversation;
mod message;
mod model;

// Re-export public API
pub use conversation::ConversationLog;
pub use message::{CardPayload, ChatMessage, MessageId, MessageKind};
pub use model::{DrawnCard, ReadingPhase, ReadingSession};
