//! Reading flow orchestration.
//!
//! `ReadingFlow` drives a conversation through a reading: it owns the
//! conversation log and the session state machine, and calls the backend
//! gateway on user actions. All failures are recovered here by appending
//! an apology bubble; the phase never advances on failure.

use std::sync::Arc;

use arcana_core::backend::ReadingBackend;
use arcana_core::phrases;
use arcana_core::session::{
    CardPayload, ConversationLog, DrawnCard, MessageId, MessageKind, ReadingPhase, ReadingSession,
};

/// Result of handling a user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    /// New messages were appended to the conversation; re-render.
    MessagesAppended,
    /// The given text should be offered as the next input line
    /// (voice transcription).
    InputSuggestion(String),
    /// A request is already in flight; the trigger was ignored.
    Busy,
    /// No state change occurred.
    NoOp,
}

/// Result of a feedback submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackStatus {
    /// The submission was attempted; failures were logged, not surfaced.
    Attempted,
    /// No reading session exists yet to attach feedback to.
    NoSession,
}

/// Drives the draw -> reflection -> interpretation conversation.
pub struct ReadingFlow {
    backend: Arc<dyn ReadingBackend>,
    session: ReadingSession,
    conversation: ConversationLog,
    /// Client-side correlation id used in log events until the backend
    /// assigns a session id.
    flow_id: String,
}

impl ReadingFlow {
    /// Creates a new flow with a welcome message already in the log.
    pub fn new(backend: Arc<dyn ReadingBackend>) -> Self {
        let mut conversation = ConversationLog::new();
        conversation.append(MessageKind::Ai(phrases::WELCOME.to_string()));

        Self {
            backend,
            session: ReadingSession::new(),
            conversation,
            flow_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Restores a flow from previously held state.
    pub fn from_parts(
        backend: Arc<dyn ReadingBackend>,
        session: ReadingSession,
        conversation: ConversationLog,
    ) -> Self {
        Self {
            backend,
            session,
            conversation,
            flow_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn conversation(&self) -> &ConversationLog {
        &self.conversation
    }

    pub fn session(&self) -> &ReadingSession {
        &self.session
    }

    /// Dispatches the primary action for the current phase: draw a card,
    /// reveal the interpretation, or reset and draw again.
    pub async fn handle_main_action(&mut self, input: &str) -> FlowOutcome {
        match self.session.phase() {
            ReadingPhase::Initial => self.handle_draw(input).await,
            ReadingPhase::Reflection => self.handle_reflection(input).await,
            ReadingPhase::Complete => {
                self.start_new_reading();
                self.handle_draw(input).await
            }
        }
    }

    /// Draws a card for the given user text (may be empty).
    pub async fn handle_draw(&mut self, input: &str) -> FlowOutcome {
        if !self.session.try_begin_request() {
            return FlowOutcome::Busy;
        }
        let outcome = self.draw_inner(input).await;
        self.session.finish_request();
        outcome
    }

    async fn draw_inner(&mut self, input: &str) -> FlowOutcome {
        let context = input.trim().to_string();
        if !context.is_empty() {
            self.conversation.append(MessageKind::User(context.clone()));
        }

        let placeholder = self
            .conversation
            .append(MessageKind::Ai(phrases::drawing_phrase().to_string()));

        match self.backend.draw(&context).await {
            Ok(draw) => {
                self.conversation.remove(placeholder);
                self.conversation.append(MessageKind::Card(CardPayload {
                    name: draw.card_name.clone(),
                    image: draw.image_data.clone(),
                }));
                let prompt = draw
                    .reflection_prompt
                    .unwrap_or_else(|| phrases::FALLBACK_REFLECTION_PROMPT.to_string());
                self.conversation.append(MessageKind::Ai(prompt));

                tracing::info!(
                    flow_id = %self.flow_id,
                    card = %draw.card_name,
                    "card drawn"
                );
                self.session.card_drawn(
                    DrawnCard {
                        name: draw.card_name,
                        image: draw.image_data,
                        original_context: context,
                    },
                    draw.session_id,
                );
                FlowOutcome::MessagesAppended
            }
            Err(err) => {
                tracing::warn!(flow_id = %self.flow_id, error = %err, "draw failed");
                self.append_apology(placeholder)
            }
        }
    }

    /// Reveals the interpretation for the card on the table, folding in
    /// the user's reflection text (may be empty).
    pub async fn handle_reflection(&mut self, input: &str) -> FlowOutcome {
        let Some(card) = self.session.current_card().cloned() else {
            return FlowOutcome::NoOp;
        };
        if !self.session.try_begin_request() {
            return FlowOutcome::Busy;
        }
        let outcome = self.reflection_inner(input, card).await;
        self.session.finish_request();
        outcome
    }

    async fn reflection_inner(&mut self, input: &str, card: DrawnCard) -> FlowOutcome {
        let reflection = input.trim().to_string();
        if !reflection.is_empty() {
            self.conversation
                .append(MessageKind::User(reflection.clone()));
        }

        let placeholder = self
            .conversation
            .append(MessageKind::Ai(phrases::loading_phrase().to_string()));

        let full_context = format!("{} CARD: {}", card.original_context, card.name);
        // The backend treats a missing reflection as a fresh draw, so an
        // empty one is sent as a single space.
        let reflection_text = if reflection.is_empty() {
            " ".to_string()
        } else {
            reflection
        };

        match self
            .backend
            .interpret(&full_context, &reflection_text, self.session.session_id())
            .await
        {
            Ok(result) => {
                self.conversation.remove(placeholder);
                self.conversation
                    .append(MessageKind::Ai(result.interpretation));
                self.session.interpretation_revealed(result.session_id);
                tracing::info!(flow_id = %self.flow_id, card = %card.name, "interpretation revealed");
                FlowOutcome::MessagesAppended
            }
            Err(err) => {
                tracing::warn!(flow_id = %self.flow_id, error = %err, "interpretation failed");
                self.append_apology(placeholder)
            }
        }
    }

    /// Resets the phase and clears the card; the conversation is retained.
    pub fn start_new_reading(&mut self) {
        self.session.start_new_reading();
    }

    /// Interprets a user-uploaded image. Does not change the phase.
    pub async fn handle_image(
        &mut self,
        image: Vec<u8>,
        file_name: &str,
        context: &str,
    ) -> FlowOutcome {
        if !self.session.try_begin_request() {
            return FlowOutcome::Busy;
        }
        let outcome = self.image_inner(image, file_name, context).await;
        self.session.finish_request();
        outcome
    }

    async fn image_inner(&mut self, image: Vec<u8>, file_name: &str, context: &str) -> FlowOutcome {
        let context = context.trim().to_string();
        if !context.is_empty() {
            self.conversation.append(MessageKind::User(context.clone()));
        }

        let placeholder = self
            .conversation
            .append(MessageKind::Ai(phrases::loading_phrase().to_string()));

        match self
            .backend
            .interpret_image(image, file_name, &context)
            .await
        {
            Ok(result) => {
                self.conversation.remove(placeholder);
                self.conversation
                    .append(MessageKind::Image(result.image_data));
                self.conversation
                    .append(MessageKind::Ai(result.interpretation));
                self.session.record_session_id(result.session_id);
                FlowOutcome::MessagesAppended
            }
            Err(err) => {
                tracing::warn!(flow_id = %self.flow_id, error = %err, "image interpretation failed");
                self.append_apology(placeholder)
            }
        }
    }

    /// Transcribes a voice recording into text for the input line.
    pub async fn transcribe_voice(&mut self, audio: Vec<u8>, file_name: &str) -> FlowOutcome {
        if !self.session.try_begin_request() {
            return FlowOutcome::Busy;
        }
        let result = self.backend.transcribe(audio, file_name).await;
        self.session.finish_request();

        match result {
            Ok(transcription) => FlowOutcome::InputSuggestion(transcription.transcription),
            Err(err) => {
                tracing::warn!(flow_id = %self.flow_id, error = %err, "transcription failed");
                self.conversation
                    .append(MessageKind::Ai(phrases::READING_ERROR.to_string()));
                FlowOutcome::MessagesAppended
            }
        }
    }

    /// Submits a feedback score for the current reading. Best-effort:
    /// failures are logged, never shown in the conversation.
    pub async fn submit_feedback(&mut self, score: u8, note: Option<&str>) -> FeedbackStatus {
        let Some(session_id) = self.session.session_id().map(str::to_string) else {
            return FeedbackStatus::NoSession;
        };

        match self.backend.submit_feedback(&session_id, score, note).await {
            Ok(()) => {
                tracing::debug!(flow_id = %self.flow_id, score, "feedback submitted");
            }
            Err(err) => {
                tracing::warn!(flow_id = %self.flow_id, error = %err, "feedback submission failed");
            }
        }
        FeedbackStatus::Attempted
    }

    fn append_apology(&mut self, placeholder: MessageId) -> FlowOutcome {
        self.conversation.remove(placeholder);
        self.conversation
            .append(MessageKind::Ai(phrases::READING_ERROR.to_string()));
        FlowOutcome::MessagesAppended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcana_core::backend::{CardDraw, ImageInterpretation, Interpretation, Transcription};
    use arcana_core::error::{ArcanaError, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Mock backend that records calls and serves canned results.
    struct MockBackend {
        draw_result: Result<CardDraw>,
        interpret_result: Result<Interpretation>,
        image_result: Result<ImageInterpretation>,
        transcribe_result: Result<Transcription>,
        feedback_result: Result<()>,
        calls: Mutex<Vec<String>>,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                draw_result: Ok(CardDraw {
                    card_name: "The Hermit".to_string(),
                    image_data: "data:image/jpeg;base64,abc".to_string(),
                    reflection_prompt: Some("What do you see?".to_string()),
                    session_id: Some("s-1".to_string()),
                }),
                interpret_result: Ok(Interpretation {
                    interpretation: "A time of introspection.".to_string(),
                    session_id: None,
                }),
                image_result: Ok(ImageInterpretation {
                    image_data: "data:image/jpeg;base64,xyz".to_string(),
                    interpretation: "A striking scene.".to_string(),
                    session_id: Some("s-2".to_string()),
                }),
                transcribe_result: Ok(Transcription {
                    transcription: "what does my future hold".to_string(),
                }),
                feedback_result: Ok(()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing_draw() -> Self {
            let mut mock = Self::new();
            mock.draw_result = Err(ArcanaError::api(500, "backend down"));
            mock
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReadingBackend for MockBackend {
        async fn draw(&self, context: &str) -> Result<CardDraw> {
            self.record(format!("draw:{context}"));
            self.draw_result.clone()
        }

        async fn interpret(
            &self,
            full_context: &str,
            reflection: &str,
            session_id: Option<&str>,
        ) -> Result<Interpretation> {
            self.record(format!(
                "interpret:{full_context}|{reflection}|{}",
                session_id.unwrap_or("-")
            ));
            self.interpret_result.clone()
        }

        async fn interpret_image(
            &self,
            _image: Vec<u8>,
            file_name: &str,
            context: &str,
        ) -> Result<ImageInterpretation> {
            self.record(format!("image:{file_name}|{context}"));
            self.image_result.clone()
        }

        async fn transcribe(&self, _audio: Vec<u8>, file_name: &str) -> Result<Transcription> {
            self.record(format!("transcribe:{file_name}"));
            self.transcribe_result.clone()
        }

        async fn submit_feedback(
            &self,
            session_id: &str,
            score: u8,
            _note: Option<&str>,
        ) -> Result<()> {
            self.record(format!("feedback:{session_id}|{score}"));
            self.feedback_result.clone()
        }
    }

    fn kinds(flow: &ReadingFlow) -> Vec<&MessageKind> {
        flow.conversation().messages().iter().map(|m| &m.kind).collect()
    }

    fn count_apologies(flow: &ReadingFlow) -> usize {
        flow.conversation()
            .messages()
            .iter()
            .filter(|m| matches!(&m.kind, MessageKind::Ai(text) if text == phrases::READING_ERROR))
            .count()
    }

    #[tokio::test]
    async fn test_successful_draw_moves_to_reflection() {
        let mut flow = ReadingFlow::new(Arc::new(MockBackend::new()));

        let outcome = flow.handle_draw("What does my future hold?").await;
        assert_eq!(outcome, FlowOutcome::MessagesAppended);
        assert_eq!(flow.session().phase(), ReadingPhase::Reflection);
        assert_eq!(
            flow.session().current_card().map(|c| c.name.as_str()),
            Some("The Hermit")
        );
        assert_eq!(flow.session().session_id(), Some("s-1"));

        // welcome, user bubble, card bubble, reflection prompt; no
        // lingering drawing placeholder
        let kinds = kinds(&flow);
        assert_eq!(kinds.len(), 4);
        assert!(matches!(kinds[1], MessageKind::User(text) if text == "What does my future hold?"));
        assert!(matches!(kinds[2], MessageKind::Card(card) if card.name == "The Hermit"));
        assert!(matches!(kinds[3], MessageKind::Ai(text) if text == "What do you see?"));
        assert!(!flow
            .conversation()
            .messages()
            .iter()
            .any(|m| matches!(&m.kind, MessageKind::Ai(text) if phrases::DRAWING.contains(&text.as_str()))));
    }

    #[tokio::test]
    async fn test_empty_input_appends_no_user_bubble() {
        let mut flow = ReadingFlow::new(Arc::new(MockBackend::new()));

        flow.handle_draw("   ").await;

        assert!(!flow
            .conversation()
            .messages()
            .iter()
            .any(|m| matches!(&m.kind, MessageKind::User(_))));
        assert_eq!(flow.session().phase(), ReadingPhase::Reflection);
    }

    #[tokio::test]
    async fn test_failed_draw_keeps_phase_and_appends_one_apology() {
        let mut flow = ReadingFlow::new(Arc::new(MockBackend::failing_draw()));

        let outcome = flow.handle_draw("hello").await;

        assert_eq!(outcome, FlowOutcome::MessagesAppended);
        assert_eq!(flow.session().phase(), ReadingPhase::Initial);
        assert!(flow.session().current_card().is_none());
        assert_eq!(count_apologies(&flow), 1);
        // the drawing placeholder was retired
        assert!(!flow
            .conversation()
            .messages()
            .iter()
            .any(|m| matches!(&m.kind, MessageKind::Ai(text) if phrases::DRAWING.contains(&text.as_str()))));
        assert!(!flow.session().is_busy());
    }

    #[tokio::test]
    async fn test_reflection_builds_full_context_and_pads_empty_reflection() {
        let backend = Arc::new(MockBackend::new());
        let mut flow = ReadingFlow::new(backend.clone());

        flow.handle_draw("What does my future hold?").await;
        let outcome = flow.handle_reflection("").await;

        assert_eq!(outcome, FlowOutcome::MessagesAppended);
        assert_eq!(flow.session().phase(), ReadingPhase::Complete);

        let calls = backend.calls();
        assert_eq!(
            calls[1],
            "interpret:What does my future hold? CARD: The Hermit| |s-1"
        );
    }

    #[tokio::test]
    async fn test_reflection_without_card_is_a_noop() {
        let backend = Arc::new(MockBackend::new());
        let mut flow = ReadingFlow::new(backend.clone());

        let outcome = flow.handle_reflection("my thoughts").await;

        assert_eq!(outcome, FlowOutcome::NoOp);
        assert!(backend.calls().is_empty());
        assert_eq!(flow.conversation().len(), 1); // welcome only
    }

    #[tokio::test]
    async fn test_busy_flag_rejects_second_trigger() {
        let backend = Arc::new(MockBackend::new());
        let mut session = ReadingSession::new();
        assert!(session.try_begin_request());
        let mut flow = ReadingFlow::from_parts(backend.clone(), session, ConversationLog::new());

        let outcome = flow.handle_draw("anything").await;

        assert_eq!(outcome, FlowOutcome::Busy);
        assert!(backend.calls().is_empty());
        assert!(flow.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_new_reading_resets_phase_and_card() {
        let mut flow = ReadingFlow::new(Arc::new(MockBackend::new()));

        flow.handle_draw("question").await;
        flow.handle_reflection("thoughts").await;
        assert_eq!(flow.session().phase(), ReadingPhase::Complete);

        flow.start_new_reading();

        assert_eq!(flow.session().phase(), ReadingPhase::Initial);
        assert!(flow.session().current_card().is_none());
        // conversation history is retained
        assert!(flow.conversation().len() > 1);
    }

    #[tokio::test]
    async fn test_main_action_from_complete_resets_and_draws() {
        let backend = Arc::new(MockBackend::new());
        let mut flow = ReadingFlow::new(backend.clone());

        flow.handle_draw("one").await;
        flow.handle_reflection("two").await;
        let outcome = flow.handle_main_action("another question").await;

        assert_eq!(outcome, FlowOutcome::MessagesAppended);
        assert_eq!(flow.session().phase(), ReadingPhase::Reflection);
        assert_eq!(backend.calls().len(), 3);
        assert_eq!(backend.calls()[2], "draw:another question");
    }

    #[tokio::test]
    async fn test_image_flow_appends_image_and_interpretation() {
        let mut flow = ReadingFlow::new(Arc::new(MockBackend::new()));

        let outcome = flow
            .handle_image(vec![1, 2, 3], "photo.jpg", "a strange dream")
            .await;

        assert_eq!(outcome, FlowOutcome::MessagesAppended);
        assert_eq!(flow.session().phase(), ReadingPhase::Initial);
        assert_eq!(flow.session().session_id(), Some("s-2"));

        let kinds = kinds(&flow);
        assert!(matches!(kinds[1], MessageKind::User(text) if text == "a strange dream"));
        assert!(matches!(kinds[2], MessageKind::Image(_)));
        assert!(matches!(kinds[3], MessageKind::Ai(text) if text == "A striking scene."));
    }

    #[tokio::test]
    async fn test_transcription_becomes_input_suggestion() {
        let mut flow = ReadingFlow::new(Arc::new(MockBackend::new()));

        let outcome = flow.transcribe_voice(vec![0u8; 4], "note.wav").await;

        assert_eq!(
            outcome,
            FlowOutcome::InputSuggestion("what does my future hold".to_string())
        );
        assert_eq!(flow.conversation().len(), 1); // nothing appended
    }

    #[tokio::test]
    async fn test_feedback_without_session_is_skipped() {
        let backend = Arc::new(MockBackend::new());
        let mut flow = ReadingFlow::new(backend.clone());

        let status = flow.submit_feedback(5, None).await;

        assert_eq!(status, FeedbackStatus::NoSession);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_feedback_failure_is_logged_not_surfaced() {
        let mut backend = MockBackend::new();
        backend.feedback_result = Err(ArcanaError::api(500, "nope"));
        let backend = Arc::new(backend);
        let mut flow = ReadingFlow::new(backend.clone());

        flow.handle_draw("question").await;
        let before = flow.conversation().len();
        let status = flow.submit_feedback(2, Some("too vague")).await;

        assert_eq!(status, FeedbackStatus::Attempted);
        assert_eq!(flow.conversation().len(), before);
        assert_eq!(backend.calls()[1], "feedback:s-1|2");
    }
}
