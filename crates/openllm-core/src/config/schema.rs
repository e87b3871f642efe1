//! Configuration schema — the record handed to the core at startup.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.
//!
//! The provider/model half of the record is validated by the model registry
//! when it is built; [`Config::validate`] covers the conversation settings.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_CONTEXT_MESSAGES: usize = 5;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 1;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant for Home Assistant.
Answer questions about the smart home and help with automations.
Be concise and helpful.";

/// Upper bound on remembered exchanges per request.
pub const MAX_CONTEXT_MESSAGES: usize = 50;
/// Upper bound on automatic retries of transient failures.
pub const MAX_RETRIES_LIMIT: u32 = 5;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration for one provider endpoint and its conversations.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Base URL of the OpenAI-compatible API (e.g. `http://litellm:4000/v1`).
    pub base_url: String,
    /// Where credentials come from.
    pub auth_mode: AuthMode,
    /// Credential shared by all models in global mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model used when a turn does not name one. Defaults to the first entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Configured models.
    pub models: Vec<ModelConfig>,
    /// System prompt prepended to every request.
    pub system_prompt: String,
    /// Number of previous exchanges sent with each request.
    pub context_messages: usize,
    /// Per-request timeout.
    pub timeout_seconds: u64,
    /// Extra attempts for timeouts and transport failures.
    pub max_retries: u32,
    /// First backoff delay; doubled on each further retry.
    pub retry_base_delay_ms: u64,
    /// What to do when a conversation already has a turn in flight.
    pub busy_policy: BusyPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth_mode: AuthMode::default(),
            api_key: None,
            model: None,
            models: Vec::new(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            context_messages: DEFAULT_CONTEXT_MESSAGES,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            busy_policy: BusyPolicy::default(),
        }
    }
}

impl Config {
    /// Check the conversation settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.context_messages > MAX_CONTEXT_MESSAGES {
            return Err(ConfigError::InvalidSetting {
                field: "contextMessages",
                reason: format!("must be at most {MAX_CONTEXT_MESSAGES}"),
            });
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "timeoutSeconds",
                reason: "must be positive".to_string(),
            });
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::InvalidSetting {
                field: "maxRetries",
                reason: format!("must be at most {MAX_RETRIES_LIMIT}"),
            });
        }
        Ok(())
    }
}

/// How the effective credential of a model is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthMode {
    /// One credential (possibly none) for every model.
    #[default]
    Global,
    /// Each model carries its own credential.
    PerModel,
}

/// Behaviour for a turn that arrives while the conversation is busy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BusyPolicy {
    /// Wait for the in-flight turn to finish.
    #[default]
    Queue,
    /// Fail immediately with a busy error.
    Reject,
}

// ─────────────────────────────────────────────
// Models
// ─────────────────────────────────────────────

/// One configured model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Credential for this model; required in per-model mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Extra request parameters passed through verbatim (e.g. `top_p`).
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra_params: serde_json::Map<String, serde_json::Value>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            display_name: None,
            api_key: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            extra_params: serde_json::Map::new(),
        }
    }
}

impl ModelConfig {
    /// Model with default parameters.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
