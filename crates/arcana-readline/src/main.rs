use std::borrow::Cow::{self, Borrowed, Owned};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use clap::Parser;
use colored::Colorize;
use rustyline::Editor;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use tracing_subscriber::EnvFilter;

use arcana_core::config;
use arcana_core::phrases;
use arcana_core::session::{ChatMessage, MessageId, MessageKind, ReadingPhase};
use arcana_interaction::{FeedbackStatus, FlowOutcome, ReadingApiClient, ReadingFlow};

/// Arcana - terminal tarot reading companion.
#[derive(Parser)]
#[command(name = "arcana")]
#[command(about = "Arcana - a chat companion for tarot readings", long_about = None)]
struct Cli {
    /// Backend base URL (overrides ARCANA_BASE_URL and the config file)
    #[arg(long)]
    base_url: Option<String>,
    /// Request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: vec![
                "/new".to_string(),
                "/image".to_string(),
                "/voice".to_string(),
                "/feedback".to_string(),
            ],
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// Prompt label standing in for the web UI's phase-dependent button.
fn prompt_for(phase: ReadingPhase) -> &'static str {
    match phase {
        ReadingPhase::Initial => "draw >> ",
        ReadingPhase::Reflection => "reflect >> ",
        ReadingPhase::Complete => "new reading >> ",
    }
}

/// Compact descriptor for image references, so data URLs don't flood the
/// terminal.
fn describe_image_ref(reference: &str) -> String {
    if let Some(rest) = reference.strip_prefix("data:") {
        let mime = rest.split(';').next().unwrap_or("image");
        let decoded_len = rest
            .split_once(',')
            .and_then(|(_, payload)| BASE64_STANDARD.decode(payload).ok())
            .map(|bytes| bytes.len());
        match decoded_len {
            Some(len) => format!("[{} image, {:.1} KB]", mime, len as f64 / 1024.0),
            None => format!("[{} image]", mime),
        }
    } else {
        format!("[image: {}]", reference)
    }
}

fn render_message(message: &ChatMessage) {
    match &message.kind {
        MessageKind::User(text) => {
            println!("{}", format!("> {}", text).green());
        }
        MessageKind::Ai(text) => {
            for line in text.lines() {
                println!("{}", line.bright_blue());
            }
        }
        MessageKind::Card(card) => {
            println!("{}", format!("* {} *", card.name).bright_magenta().bold());
            println!("{}", describe_image_ref(&card.image).dimmed());
        }
        MessageKind::Image(reference) => {
            println!("{}", describe_image_ref(reference).cyan());
        }
    }
    println!();
}

/// Renders every message appended since `last_rendered` and returns the
/// new high-water mark.
fn render_new(flow: &ReadingFlow, last_rendered: MessageId) -> MessageId {
    for message in flow.conversation().since(last_rendered) {
        render_message(message);
    }
    flow.conversation().last_id().unwrap_or(last_rendered)
}

fn file_name_of(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload.bin")
}

async fn read_upload(path: &str) -> Option<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            println!("{}", format!("Couldn't read {}: {}", path, err).red());
            None
        }
    }
}

/// The main entry point for the Arcana readline application.
///
/// Sets up a rustyline-based REPL that:
/// 1. Builds the HTTP gateway from config file / environment / flags
/// 2. Provides command completion for /new, /image, /voice, /feedback
/// 3. Dispatches plain input to the phase-appropriate reading action
/// 4. Displays colored output for user, AI, card, and image bubbles
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Priority: flag > ARCANA_BASE_URL > config file > default
    let mut client_config = config::load_config().unwrap_or_default();
    if let Ok(base_url) = std::env::var("ARCANA_BASE_URL") {
        client_config.base_url = base_url;
    }
    if let Some(base_url) = cli.base_url {
        client_config.base_url = base_url;
    }
    if let Some(timeout_secs) = cli.timeout_secs {
        client_config.timeout_secs = timeout_secs;
    }

    let client = ReadingApiClient::new(&client_config)?;
    let mut flow = ReadingFlow::new(Arc::new(client));

    // ===== REPL Setup =====
    let helper = CliHelper::new();
    let mut rl: Editor<CliHelper, rustyline::history::DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(helper));

    println!("{}", "=== Arcana ===".bright_magenta().bold());
    println!(
        "{}",
        "Press Enter to draw, or type a question first. Commands: /new, /image <path> [context], /voice <path>, /feedback <1-5> [note]. 'quit' to exit."
            .bright_black()
    );
    println!();

    let mut last_rendered = render_new(&flow, 0);

    // ===== Main REPL Loop =====
    loop {
        let readline = rl.readline(prompt_for(flow.session().phase()));

        match readline {
            Ok(line) => {
                let trimmed = line.trim();

                // Handle quit command
                if trimmed == "quit" || trimmed == "exit" {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }

                if !trimmed.is_empty() {
                    let _ = rl.add_history_entry(&line);
                }

                let outcome = if let Some(rest) = trimmed.strip_prefix('/') {
                    handle_command(&mut flow, rest).await
                } else {
                    // An empty line presses the main button: draw, reveal,
                    // or start over depending on the phase.
                    flow.handle_main_action(trimmed).await
                };

                match outcome {
                    FlowOutcome::Busy => {
                        println!("{}", "The cards are still being consulted...".yellow());
                    }
                    FlowOutcome::InputSuggestion(text) => {
                        println!("{}", format!("Transcribed: {}", text).bright_black());
                        let followup = flow.handle_main_action(&text).await;
                        if followup == FlowOutcome::Busy {
                            println!("{}", "The cards are still being consulted...".yellow());
                        }
                    }
                    FlowOutcome::MessagesAppended | FlowOutcome::NoOp => {}
                }

                last_rendered = render_new(&flow, last_rendered);
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    Ok(())
}

/// Dispatches a slash command (received without the leading '/').
async fn handle_command(flow: &mut ReadingFlow, input: &str) -> FlowOutcome {
    let mut parts = input.split_whitespace();
    let command = parts.next().unwrap_or_default();

    match command {
        "new" => {
            flow.start_new_reading();
            println!("{}", phrases::NEW_READING.bright_blue());
            println!();
            FlowOutcome::NoOp
        }
        "image" => {
            let Some(path) = parts.next() else {
                println!("{}", "Usage: /image <path> [context]".bright_black());
                return FlowOutcome::NoOp;
            };
            let context = parts.collect::<Vec<_>>().join(" ");
            let Some(bytes) = read_upload(path).await else {
                return FlowOutcome::NoOp;
            };
            flow.handle_image(bytes, file_name_of(path), &context).await
        }
        "voice" => {
            let Some(path) = parts.next() else {
                println!("{}", "Usage: /voice <path>".bright_black());
                return FlowOutcome::NoOp;
            };
            let Some(bytes) = read_upload(path).await else {
                return FlowOutcome::NoOp;
            };
            flow.transcribe_voice(bytes, file_name_of(path)).await
        }
        "feedback" => {
            let score = parts.next().and_then(|s| s.parse::<u8>().ok());
            let Some(score @ 1..=5) = score else {
                println!("{}", "Usage: /feedback <1-5> [note]".bright_black());
                return FlowOutcome::NoOp;
            };
            let note = parts.collect::<Vec<_>>().join(" ");
            let note = if note.is_empty() { None } else { Some(note) };

            match flow.submit_feedback(score, note.as_deref()).await {
                FeedbackStatus::Attempted => {
                    println!("{}", "Thank you - your feedback was recorded.".bright_black());
                }
                FeedbackStatus::NoSession => {
                    println!("{}", "Draw a card first, then share your feedback.".yellow());
                }
            }
            FlowOutcome::NoOp
        }
        _ => {
            println!("{}", "Unknown command".bright_black());
            FlowOutcome::NoOp
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_follows_phase() {
        assert_eq!(prompt_for(ReadingPhase::Initial), "draw >> ");
        assert_eq!(prompt_for(ReadingPhase::Reflection), "reflect >> ");
        assert_eq!(prompt_for(ReadingPhase::Complete), "new reading >> ");
    }

    #[test]
    fn test_describe_image_ref_data_url() {
        let reference = format!("data:image/jpeg;base64,{}", BASE64_STANDARD.encode([0u8; 2048]));
        let described = describe_image_ref(&reference);
        assert!(described.contains("image/jpeg"));
        assert!(described.contains("2.0 KB"));
    }

    #[test]
    fn test_describe_image_ref_path() {
        assert_eq!(
            describe_image_ref("/static/cards/the-hermit.jpg"),
            "[image: /static/cards/the-hermit.jpg]"
        );
    }

    #[test]
    fn test_file_name_of() {
        assert_eq!(file_name_of("/tmp/photo.jpg"), "photo.jpg");
        assert_eq!(file_name_of("note.wav"), "note.wav");
    }

    #[test]
    fn test_helper_completes_slash_commands() {
        let helper = CliHelper::new();
        let history = rustyline::history::DefaultHistory::new();
        let ctx = Context::new(&history);
        let (start, candidates) = helper.complete("/fe", 3, &ctx).unwrap();

        assert_eq!(start, 0);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].replacement, "/feedback");
    }
}
