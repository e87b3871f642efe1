//! Interactive REPL.
//!
//! Uses `rustyline` for readline-style editing with persistent history.
//! Ctrl-C while a reply is pending cancels that turn only.

use anyhow::Result;
use rustyline::config::Configurer;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use openllm_agent::{ConversationAgent, TurnError, TurnRequest};

use crate::helpers;

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

const RESET_COMMAND: &str = "/reset";

/// Run the interactive REPL loop.
pub async fn run(
    agent: ConversationAgent,
    conversation_id: Option<String>,
    model: Option<String>,
) -> Result<()> {
    let default_model = agent.snapshot().await.registry.default_model().to_string();
    helpers::print_banner(model.as_deref().unwrap_or(&default_model));

    let mut editor = create_editor()?;
    let mut conversation_id = conversation_id;

    loop {
        // Read input
        let input = match editor.readline("You: ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted) => {
                // Ctrl-C — exit cleanly
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                // Ctrl-D — exit cleanly
                break;
            }
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
            if let Some(id) = conversation_id.take() {
                agent.reset_conversation(&id).await;
            }
            println!("\nConversation reset.\n");
            continue;
        }

        let request = TurnRequest {
            conversation_id: conversation_id.clone(),
            text: trimmed.to_string(),
            model: model.clone(),
        };

        debug!(conversation = ?conversation_id, "processing input");
        helpers::print_thinking();

        let cancel = CancellationToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };
        let result = agent.process_turn_cancellable(request, cancel).await;
        interrupt.abort();
        helpers::clear_thinking();

        conversation_id = Some(result.conversation_id);
        match result.outcome {
            Ok(reply) => helpers::print_response(&reply),
            Err(TurnError::Cancelled) => eprintln!("\n(cancelled)\n"),
            Err(e) => eprintln!("\n❌ {}\n", helpers::describe_error(&e)),
        }
    }

    save_history(&mut editor);

    Ok(())
}

/// Create a rustyline editor with history.
fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;

    let history_path = history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
        debug!("loaded REPL history from {}", history_path.display());
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
        debug!("failed to save history: {e}");
    }
}

/// Path to the history file.
fn history_path() -> std::path::PathBuf {
    openllm_core::utils::get_data_path()
        .join("history")
        .join("cli_history")
}

/// Check if input is an exit command.
fn is_exit_command(input: &str) -> bool {
    let lower = input.to_lowercase();
    EXIT_COMMANDS.contains(&lower.as_str())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
