//! Canned conversation texts.
//!
//! The drawing/loading placeholder phrases are picked at random so the
//! wait for the backend feels a little less mechanical.

use rand::seq::SliceRandom;

/// Greeting appended as the first message of every conversation.
pub const WELCOME: &str = "Welcome to Arcana.\n\n\
Press Enter to draw a card, or type a question or thought first.";

/// Generic apology appended when a backend call fails.
pub const READING_ERROR: &str =
    "I apologize, but I couldn't complete the reading. Please try again.";

/// Shown when a completed reading is reset.
pub const NEW_READING: &str = "Would you like another reading?";

/// Used when the backend omits a reflection prompt from a draw response.
pub const FALLBACK_REFLECTION_PROMPT: &str =
    "Take a moment with this card. What does it bring to mind for you?";

/// Placeholder texts shown while a card is being drawn.
pub const DRAWING: [&str; 8] = [
    "Shuffling the ancient deck...",
    "Connecting with cosmic energies...",
    "Seeking the cards that speak to you...",
    "Reading the energies...",
    "Aligning with the cosmic forces...",
    "Consulting the ancient wisdom...",
    "Delving into the mystic deck...",
    "Finding your destined card...",
];

/// Placeholder texts shown while an interpretation is being prepared.
pub const LOADING: [&str; 8] = [
    "Consulting the stars...",
    "Peering through the cosmic veil...",
    "Aligning with celestial energies...",
    "Reading ancient symbols...",
    "Channeling mystic wisdom...",
    "Decoding ethereal messages...",
    "Seeking guidance from beyond...",
    "Unveiling cosmic patterns...",
];

/// Picks a random drawing placeholder.
pub fn drawing_phrase() -> &'static str {
    DRAWING
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(DRAWING[0])
}

/// Picks a random loading placeholder.
pub fn loading_phrase() -> &'static str {
    LOADING
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(LOADING[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phrases_come_from_their_tables() {
        for _ in 0..32 {
            assert!(DRAWING.contains(&drawing_phrase()));
            assert!(LOADING.contains(&loading_phrase()));
        }
    }
}
