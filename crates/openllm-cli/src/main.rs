//! OpenLLM CLI — entry point.
//!
//! # Commands
//!
//! - `openllm chat [-m MESSAGE] [-c CONVERSATION] [--model ID]` — chat (single-shot or REPL)
//! - `openllm models` — list the models the endpoint advertises
//! - `openllm task INSTRUCTIONS [--json]` — one-shot AI task
//! - `openllm status` — show configuration status
//!
//! Every command accepts `--config PATH` and `--logs`.

mod helpers;
mod repl;
mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use openllm_agent::{ConversationAgent, TurnRequest};
use openllm_core::config::load_config;
use openllm_core::types::Discovery;
use openllm_providers::HttpTransport;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// OpenLLM Conversation — chat with any OpenAI-compatible endpoint
#[derive(Parser)]
#[command(name = "openllm", version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.openllm/config.json)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, default_value_t = false)]
    logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the model (single-shot or interactive REPL)
    Chat {
        /// Single message (non-interactive). Omit for REPL mode.
        #[arg(short, long)]
        message: Option<String>,

        /// Conversation to continue
        #[arg(short, long)]
        conversation: Option<String>,

        /// Model to use instead of the configured default
        #[arg(long)]
        model: Option<String>,
    },

    /// List the models the endpoint advertises
    Models,

    /// Run a one-shot AI task
    Task {
        /// What to generate
        instructions: String,

        /// Ask for JSON output and parse it
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show configuration status
    Status,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.logs);

    let config_path = cli.config.as_deref().map(helpers::expand_tilde);
    let config_path = config_path.as_deref();

    match cli.command {
        Commands::Chat {
            message,
            conversation,
            model,
        } => run_chat(config_path, message, conversation, model).await,
        Commands::Models => run_models(config_path).await,
        Commands::Task { instructions, json } => run_task(config_path, &instructions, json).await,
        Commands::Status => status::run(config_path),
    }
}

/// Load the configuration and build the agent over HTTP.
pub fn build_agent(config_path: Option<&Path>) -> Result<ConversationAgent> {
    let config = load_config(config_path).context("failed to load configuration")?;
    let transport = Arc::new(HttpTransport::new());
    ConversationAgent::new(&config, transport).context("invalid configuration")
}

// ─────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────

async fn run_chat(
    config_path: Option<&Path>,
    message: Option<String>,
    conversation: Option<String>,
    model: Option<String>,
) -> Result<()> {
    let agent = build_agent(config_path)?;

    match message {
        Some(text) => {
            // Single-shot mode
            let mut request = TurnRequest::new(text);
            request.conversation_id = conversation;
            request.model = model;

            info!("processing single message");
            let result = agent.process_turn(request).await;
            let reply = result
                .outcome
                .map_err(|e| anyhow!(helpers::describe_error(&e)))?;

            helpers::print_response(&reply);
            println!(
                "{}",
                format!("conversation: {}", result.conversation_id).dimmed()
            );
        }
        None => {
            // Interactive REPL mode
            repl::run(agent, conversation, model).await?;
        }
    }

    Ok(())
}

async fn run_models(config_path: Option<&Path>) -> Result<()> {
    let agent = build_agent(config_path)?;
    let snapshot = agent.snapshot().await;

    let discovery = agent
        .discover_models()
        .await
        .context("failed to reach the endpoint")?;

    println!();
    match discovery {
        Discovery::Available(ids) if ids.is_empty() => {
            println!("{}", "The endpoint reports no models.".yellow());
        }
        Discovery::Available(ids) => {
            println!("{}", "Available models:".bold());
            for id in ids {
                let marker = if snapshot.registry.get(&id).is_some() {
                    "✓".green().to_string()
                } else {
                    " ".to_string()
                };
                println!("  {marker} {id}");
            }
        }
        Discovery::Unsupported { status } => {
            let detail = status.map(|s| format!(" (HTTP {s})")).unwrap_or_default();
            println!(
                "{}",
                format!("The endpoint does not list its models{detail}.").yellow()
            );
            println!(
                "{}",
                "Enter model ids manually under \"models\" in the config file.".dimmed()
            );
        }
    }
    println!();

    Ok(())
}

async fn run_task(config_path: Option<&Path>, instructions: &str, json: bool) -> Result<()> {
    let agent = build_agent(config_path)?;

    let output = agent
        .generate_data(instructions, json)
        .await
        .map_err(|e| anyhow!(helpers::describe_error(&e)))?;

    match output.data {
        serde_json::Value::String(text) => println!("{text}"),
        data => println!(
            "{}",
            serde_json::to_string_pretty(&data).context("failed to render task output")?
        ),
    }

    Ok(())
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("openllm=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Location of the config file for display purposes.
pub fn resolved_config_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(PathBuf::from)
        .unwrap_or_else(openllm_core::config::get_config_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_chat_with_global_flags() {
        let cli = Cli::try_parse_from([
            "openllm", "chat", "-m", "hello", "-c", "kitchen", "--model", "llama3", "--logs",
        ])
        .unwrap();
        assert!(cli.logs);
        match cli.command {
            Commands::Chat {
                message,
                conversation,
                model,
            } => {
                assert_eq!(message.as_deref(), Some("hello"));
                assert_eq!(conversation.as_deref(), Some("kitchen"));
                assert_eq!(model.as_deref(), Some("llama3"));
            }
            _ => panic!("expected chat command"),
        }
    }

    #[test]
    fn parses_task_json_flag() {
        let cli = Cli::try_parse_from(["openllm", "--config", "/tmp/c.json", "task", "list rooms", "--json"])
            .unwrap();
        assert_eq!(cli.config.as_deref(), Some("/tmp/c.json"));
        assert!(matches!(cli.command, Commands::Task { json: true, .. }));
    }

    #[test]
    fn resolved_config_path_prefers_flag() {
        let path = resolved_config_path(Some(Path::new("/etc/openllm.json")));
        assert_eq!(path, PathBuf::from("/etc/openllm.json"));
        assert!(resolved_config_path(None).ends_with("config.json"));
    }

    #[test]
    fn build_agent_rejects_missing_models() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"baseUrl": "http://localhost:4000"}"#).unwrap();

        let err = build_agent(Some(&path)).err().unwrap();
        assert!(format!("{err:#}").contains("no models configured"));
    }
}
