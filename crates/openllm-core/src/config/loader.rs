//! Config loader — reads `~/.openllm/config.json`, applies legacy migrations,
//! and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.openllm/config.json`
//! 3. Environment variables `OPENLLM_<FIELD>` (override JSON)
//!
//! A missing file is not an error. A file that exists but does not parse is:
//! the caller must refuse to start rather than run on silent defaults.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::schema::{Config, ModelConfig};
use crate::error::ConfigError;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the given path (or the default one) + env vars.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    load_config_from_path(&config_path)
}

/// Load config from a specific file path.
fn load_config_from_path(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return Ok(apply_env_overrides(Config::default()));
    }

    debug!("Loading config from {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    // Parse JSON → Value first for migration
    let mut raw: serde_json::Value = serde_json::from_str(&content)?;

    migrate_config(&mut raw);

    let config: Config = serde_json::from_value(raw)?;

    Ok(apply_env_overrides(config))
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply legacy config migrations.
///
/// - `promptTemplate` → `systemPrompt`, `timeout` → `timeoutSeconds`
/// - single-model records (`model` + top-level `maxTokens`/`temperature`, no
///   `models` list) → a one-entry `models` list
fn migrate_config(raw: &mut serde_json::Value) {
    let Some(obj) = raw.as_object_mut() else {
        return;
    };

    for (old, new) in [("promptTemplate", "systemPrompt"), ("timeout", "timeoutSeconds")] {
        if let Some(val) = obj.remove(old) {
            if !obj.contains_key(new) {
                obj.insert(new.to_string(), val);
                debug!("Migrated {} → {}", old, new);
            }
        }
    }

    let max_tokens = obj.remove("maxTokens");
    let temperature = obj.remove("temperature");
    if obj.contains_key("models") {
        return;
    }
    let Some(model) = obj.get("model").and_then(|m| m.as_str()).map(String::from) else {
        return;
    };

    let mut entry = serde_json::Map::new();
    entry.insert("id".to_string(), serde_json::Value::String(model));
    if let Some(v) = max_tokens {
        entry.insert("maxTokens".to_string(), v);
    }
    if let Some(v) = temperature {
        entry.insert("temperature".to_string(), v);
    }
    obj.insert(
        "models".to_string(),
        serde_json::Value::Array(vec![serde_json::Value::Object(entry)]),
    );
    debug!("Migrated single-model record → models[0]");
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Supported overrides:
/// - `OPENLLM_BASE_URL` → `base_url`
/// - `OPENLLM_API_KEY` → `api_key`
/// - `OPENLLM_MODEL` → `model` (added to `models` with defaults if missing)
/// - `OPENLLM_SYSTEM_PROMPT` → `system_prompt`
/// - `OPENLLM_CONTEXT_MESSAGES` → `context_messages`
/// - `OPENLLM_TIMEOUT_SECONDS` → `timeout_seconds`
/// - `OPENLLM_MAX_RETRIES` → `max_retries`
fn apply_env_overrides(config: Config) -> Config {
    apply_overrides(config, |key| std::env::var(key).ok())
}

fn apply_overrides(mut config: Config, var: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(val) = var("OPENLLM_BASE_URL") {
        config.base_url = val;
    }
    if let Some(val) = var("OPENLLM_API_KEY") {
        config.api_key = Some(val);
    }
    if let Some(val) = var("OPENLLM_MODEL") {
        if !config.models.iter().any(|m| m.id == val) {
            config.models.push(ModelConfig::new(val.clone()));
        }
        config.model = Some(val);
    }
    if let Some(val) = var("OPENLLM_SYSTEM_PROMPT") {
        config.system_prompt = val;
    }
    if let Some(n) = var("OPENLLM_CONTEXT_MESSAGES").and_then(|v| v.parse::<usize>().ok()) {
        config.context_messages = n;
    }
    if let Some(n) = var("OPENLLM_TIMEOUT_SECONDS").and_then(|v| v.parse::<u64>().ok()) {
        config.timeout_seconds = n;
    }
    if let Some(n) = var("OPENLLM_MAX_RETRIES").and_then(|v| v.parse::<u32>().ok()) {
        config.max_retries = n;
    }

    config
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
