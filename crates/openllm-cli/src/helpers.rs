//! Shared CLI helpers — path expansion, reply printing, error rendering.

use std::path::PathBuf;

use colored::Colorize;

use openllm_agent::{TurnError, TurnReply};
use openllm_core::RequestError;

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs_next::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Print an assistant reply to stdout.
pub fn print_response(reply: &TurnReply) {
    println!();
    println!("{}", reply.model.cyan().bold());
    if reply.text.is_empty() {
        println!("{}", "(no response)".dimmed());
    } else {
        println!("{}", reply.text);
    }
    if let Some(usage) = &reply.usage {
        println!(
            "{}",
            format!(
                "tokens: {} prompt + {} completion",
                usage.prompt_tokens, usage.completion_tokens
            )
            .dimmed()
        );
    }
    println!();
}

/// Print the banner shown at REPL start.
pub fn print_banner(model: &str) {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!(
        "{}  v{}  {}",
        "OpenLLM".cyan().bold(),
        version.dimmed(),
        model.dimmed()
    );
    println!(
        "{}",
        "Type a message, \"/reset\" to forget the conversation, or \"exit\" to quit.".dimmed()
    );
    println!();
}

/// Print a "thinking" placeholder.
pub fn print_thinking() {
    eprint!("{}", "⠿ thinking...".dimmed());
}

/// Clear the "thinking" placeholder.
pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(40));
}

/// One-line explanation of a failed turn, with a hint where one helps.
pub fn describe_error(err: &TurnError) -> String {
    let hint = match err {
        TurnError::Request(RequestError::Auth { .. }) => Some("check the API key".to_string()),
        TurnError::Request(RequestError::NotFound { .. }) => {
            Some("check the model id with `openllm models`".to_string())
        }
        TurnError::Request(e @ RequestError::RateLimited { .. }) => e
            .wait_hint()
            .map(|wait| format!("try again in {}s", wait.as_secs())),
        TurnError::Request(RequestError::Transport(_)) => {
            Some("is the endpoint reachable?".to_string())
        }
        _ => None,
    };

    match hint {
        Some(hint) => format!("{} ({hint})", err.user_message()),
        None => err.user_message(),
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
