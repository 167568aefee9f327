//! Interactive REPL.
//!
//! Uses `rustyline` for readline-style editing with persistent history. The
//! transcript lives in memory for the session only.

use anyhow::Result;
use rustyline::config::Configurer;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tracing::debug;

use omnichat_agent::{ChatOptions, Client};
use omnichat_core::utils::get_history_path;
use omnichat_core::{ChatCompletionResponse, Message};

use crate::helpers;

/// Inputs that end the session, compared case-insensitively.
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", "/bye", ":q"];

/// Clears the transcript, keeping the system prompt.
const RESET_COMMAND: &str = "/reset";

const MAX_HISTORY: usize = 1000;

// ─────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────

/// One conversation with one model.
pub struct Session {
    client: Client,
    model: String,
    options: ChatOptions,
    transcript: Vec<Message>,
}

impl Session {
    pub fn new(client: Client, model: String, options: ChatOptions) -> Self {
        Self {
            client,
            model,
            options,
            transcript: Vec::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Set the system prompt. It always stays the first message.
    pub fn set_system(&mut self, prompt: String) {
        if let Some(Message::System { .. }) = self.transcript.first() {
            self.transcript.remove(0);
        }
        self.transcript.insert(0, Message::system(prompt));
    }

    /// Drop everything but the system prompt.
    pub fn reset(&mut self) {
        self.transcript
            .retain(|m| matches!(m, Message::System { .. }));
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Send one user message and record the reply.
    ///
    /// A failed call leaves the transcript as it was.
    pub async fn send(&mut self, text: &str) -> Result<ChatCompletionResponse> {
        self.transcript.push(Message::user(text));
        let result = self
            .client
            .create(&self.model, &self.transcript, self.options.clone())
            .await;

        match result {
            Ok(response) => {
                if let Some(choice) = response.choice() {
                    // Tool turns, if any, come before the final reply.
                    let history = &choice.intermediate_messages;
                    if history.is_empty() {
                        self.transcript.push(Message::from(choice.message.clone()));
                    } else {
                        self.transcript.extend(history.iter().cloned());
                    }
                }
                Ok(response)
            }
            Err(e) => {
                self.transcript.pop();
                Err(e.into())
            }
        }
    }
}

// ─────────────────────────────────────────────
// REPL loop
// ─────────────────────────────────────────────

/// Run the interactive REPL loop.
pub async fn run(mut session: Session) -> Result<()> {
    helpers::print_banner(session.model());

    let mut editor = create_editor()?;

    loop {
        let input = match editor.readline("You: ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted) => break,
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }

        if is_exit_command(trimmed) {
            println!("\nGoodbye!");
            break;
        }

        let _ = editor.add_history_entry(&input);

        if trimmed.eq_ignore_ascii_case(RESET_COMMAND) {
            session.reset();
            helpers::print_notice("Conversation cleared.");
            continue;
        }

        debug!(model = session.model(), input = trimmed, "processing input");
        helpers::print_thinking();

        match session.send(trimmed).await {
            Ok(response) => {
                helpers::clear_thinking();
                helpers::print_response(&response);
            }
            Err(e) => {
                helpers::clear_thinking();
                eprintln!("\nError: {e:#}\n");
            }
        }
    }

    save_history(&mut editor);

    Ok(())
}

/// Line editor preloaded with the saved history, if any.
fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(MAX_HISTORY)?;

    let path = history_path();
    match editor.load_history(&path) {
        Ok(()) => debug!(path = %path.display(), "loaded REPL history"),
        Err(e) => debug!(path = %path.display(), error = %e, "no REPL history loaded"),
    }

    Ok(editor)
}

/// Save history to disk.
fn save_history(editor: &mut Editor<(), DefaultHistory>) {
    let path = history_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(&path) {
        debug!(path = %path.display(), error = %e, "failed to save REPL history");
    }
}

fn history_path() -> std::path::PathBuf {
    get_history_path().join("cli_history")
}

fn is_exit_command(input: &str) -> bool {
    EXIT_COMMANDS.iter().any(|cmd| cmd.eq_ignore_ascii_case(input))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
