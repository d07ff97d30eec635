//! Reading session state.
//!
//! This module contains the state machine that tracks a reading through
//! its three phases, the card currently on the table, and the busy flag
//! that serializes backend requests.

use serde::{Deserialize, Serialize};

/// The phase of a reading.
///
/// Transitions are strictly linear: `Initial` -> `Reflection` ->
/// `Complete`, then back to `Initial` when a new reading starts. A failed
/// backend call never advances the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingPhase {
    /// Waiting for the user to ask for a card.
    Initial,
    /// A card is on the table; waiting for the user's reflection.
    Reflection,
    /// The interpretation has been revealed.
    Complete,
}

/// The card currently on the table, with the context it was drawn for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawnCard {
    /// Card name as reported by the backend.
    pub name: String,
    /// Image reference (data URL or server-relative path).
    pub image: String,
    /// The user text the card was drawn for, possibly empty.
    pub original_context: String,
}

/// State of the current reading.
///
/// Invariant: `current_card` is `Some` whenever the phase is `Reflection`,
/// and is cleared when the phase returns to `Initial`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingSession {
    phase: ReadingPhase,
    current_card: Option<DrawnCard>,
    /// Backend-assigned id correlating draw, reflection, and feedback.
    session_id: Option<String>,
    /// At most one backend request may be in flight.
    #[serde(skip)]
    busy: bool,
}

impl ReadingSession {
    /// Creates a fresh session in the `Initial` phase.
    pub fn new() -> Self {
        Self {
            phase: ReadingPhase::Initial,
            current_card: None,
            session_id: None,
            busy: false,
        }
    }

    pub fn phase(&self) -> ReadingPhase {
        self.phase
    }

    pub fn current_card(&self) -> Option<&DrawnCard> {
        self.current_card.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Claims the busy flag for a new backend request.
    ///
    /// Returns `false` if a request is already in flight, in which case
    /// the caller must treat the trigger as a no-op.
    pub fn try_begin_request(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    /// Releases the busy flag once a request has settled.
    pub fn finish_request(&mut self) {
        self.busy = false;
    }

    /// Records a successful draw: stores the card and moves to `Reflection`.
    pub fn card_drawn(&mut self, card: DrawnCard, session_id: Option<String>) {
        self.current_card = Some(card);
        if session_id.is_some() {
            self.session_id = session_id;
        }
        self.phase = ReadingPhase::Reflection;
    }

    /// Records a successful interpretation: moves to `Complete`.
    pub fn interpretation_revealed(&mut self, session_id: Option<String>) {
        if session_id.is_some() {
            self.session_id = session_id;
        }
        self.phase = ReadingPhase::Complete;
    }

    /// Records a backend-assigned session id without a phase change
    /// (image interpretations report one too).
    pub fn record_session_id(&mut self, session_id: Option<String>) {
        if session_id.is_some() {
            self.session_id = session_id;
        }
    }

    /// Resets to the `Initial` phase and clears the card.
    ///
    /// The session id is retained until the next draw replaces it, so
    /// late feedback still reaches the right reading.
    pub fn start_new_reading(&mut self) {
        self.phase = ReadingPhase::Initial;
        self.current_card = None;
    }
}

impl Default for ReadingSession {
    fn default() -> Self {
        Self::new()
    }
}
