//! `openllm status` — show configuration status.
//!
//! - Shows config path, endpoint, auth mode
//! - Lists configured models and whether each has a usable credential
//! - Validates the record the same way the agent does

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use openllm_agent::Snapshot;
use openllm_core::config::{load_config, AuthMode, Config};
use openllm_core::utils::sanitize_url;

/// Run the status command.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    let path = crate::resolved_config_path(config_path);

    println!();
    println!("{}", "OpenLLM Status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        path.display(),
        if path.exists() {
            "✓".green().to_string()
        } else {
            "(not found)".red().to_string()
        }
    );

    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("  {:<18} {}", "".bold(), e.to_string().red());
            println!();
            return Ok(());
        }
    };

    print_endpoint(&config);
    print_models(&config);

    println!();
    match Snapshot::from_config(&config) {
        Ok(_) => println!("  {:<18} {}", "Validation:".bold(), "✓ ready".green()),
        Err(e) => println!("  {:<18} {}", "Validation:".bold(), e.to_string().red()),
    }
    println!();

    Ok(())
}

fn print_endpoint(config: &Config) {
    let base_url = if config.base_url.is_empty() {
        "(not set)".red().to_string()
    } else {
        sanitize_url(&config.base_url)
    };
    println!("  {:<18} {}", "Endpoint:".bold(), base_url);

    let auth = match config.auth_mode {
        AuthMode::Global => {
            let key = if config.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
                "key set".to_string()
            } else {
                "no key".dimmed().to_string()
            };
            format!("global ({key})")
        }
        AuthMode::PerModel => "per model".to_string(),
    };
    println!("  {:<18} {}", "Auth:".bold(), auth);

    println!(
        "  {:<18} {} | timeout: {}s | retries: {} | busy: {:?}",
        "Conversation:".bold(),
        format!("context: {}", config.context_messages).dimmed(),
        config.timeout_seconds,
        config.max_retries,
        config.busy_policy,
    );
}

fn print_models(config: &Config) {
    println!();
    println!("  {}", "Models:".bold());
    if config.models.is_empty() {
        println!("    {}", "· none configured".dimmed());
        return;
    }

    let default_model = config
        .model
        .as_deref()
        .or_else(|| config.models.first().map(|m| m.id.as_str()));

    for model in &config.models {
        let marker = if Some(model.id.as_str()) == default_model {
            " (default)".cyan().to_string()
        } else {
            String::new()
        };
        let credential = match config.auth_mode {
            AuthMode::Global => String::new(),
            AuthMode::PerModel if model.api_key.as_deref().is_some_and(|k| !k.is_empty()) => {
                format!("{} (key set)", "✓".green())
            }
            AuthMode::PerModel => format!("{}", "✗ no key".red()),
        };
        println!(
            "    {:<24} {} {}{}",
            model.id,
            format!("max_tokens: {} temp: {}", model.max_tokens, model.temperature).dimmed(),
            credential,
            marker
        );
    }
}
