//! Backend gateway trait and response types.
//!
//! The reading backend owns card selection, interpretation text, image
//! storage, and feedback persistence; this crate only ever sees it through
//! the `ReadingBackend` trait. The HTTP implementation lives in
//! `arcana-interaction`; tests substitute mocks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Result of an initial card draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDraw {
    /// Name of the drawn card.
    pub card_name: String,
    /// Image reference (data URL or server-relative path).
    pub image_data: String,
    /// Prompt inviting the user to reflect before the reveal.
    /// Older backend revisions omit it.
    pub reflection_prompt: Option<String>,
    /// Backend-assigned session id for this reading.
    pub session_id: Option<String>,
}

/// Result of revealing the interpretation for a drawn card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpretation {
    pub interpretation: String,
    pub session_id: Option<String>,
}

/// Result of interpreting a user-uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInterpretation {
    /// Re-encoded image reference, suitable for a chat bubble.
    pub image_data: String,
    pub interpretation: String,
    pub session_id: Option<String>,
}

/// Result of transcribing a voice recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcription {
    pub transcription: String,
}

/// Gateway to the tarot reading backend.
///
/// All calls are fire-and-await: no concurrency between them within one
/// user action, no retries, no queueing.
#[async_trait]
pub trait ReadingBackend: Send + Sync {
    /// Draws a card for the given user context (may be empty).
    async fn draw(&self, context: &str) -> Result<CardDraw>;

    /// Reveals the interpretation for the current card.
    ///
    /// `full_context` carries the original question plus the card marker;
    /// `reflection` is the user's reflection text.
    async fn interpret(
        &self,
        full_context: &str,
        reflection: &str,
        session_id: Option<&str>,
    ) -> Result<Interpretation>;

    /// Interprets a user-uploaded image in the given context.
    async fn interpret_image(
        &self,
        image: Vec<u8>,
        file_name: &str,
        context: &str,
    ) -> Result<ImageInterpretation>;

    /// Transcribes a voice recording into input text.
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<Transcription>;

    /// Submits a feedback score for a reading. Best-effort: callers log
    /// failures instead of surfacing them.
    async fn submit_feedback(
        &self,
        session_id: &str,
        score: u8,
        note: Option<&str>,
    ) -> Result<()>;
}
