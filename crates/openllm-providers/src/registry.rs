//! Model registry — the configured models of one provider endpoint.
//!
//! A registry is an immutable snapshot: it is validated once when built from
//! a configuration record and never edited afterwards. Reconfiguration builds
//! a new registry; whoever still holds the old one keeps using it.

use std::collections::HashSet;
use std::time::Duration;

use openllm_core::config::{AuthMode, Config, ModelConfig};
use openllm_core::types::Discovery;
use openllm_core::{ConfigError, RequestError};
use tracing::debug;
use url::Url;

use crate::traits::ChatTransport;

/// Request keys owned by the typed fields of a chat completion body.
const RESERVED_PARAMS: &[&str] = &["model", "messages", "max_tokens", "temperature"];

// ─────────────────────────────────────────────
// ProviderEndpoint
// ─────────────────────────────────────────────

/// One OpenAI-compatible backend: base URL plus authentication policy.
#[derive(Clone)]
pub struct ProviderEndpoint {
    base_url: String,
    auth_mode: AuthMode,
    global_credential: Option<String>,
}

impl std::fmt::Debug for ProviderEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEndpoint")
            .field("base_url", &openllm_core::utils::sanitize_url(&self.base_url))
            .field("auth_mode", &self.auth_mode)
            .field("has_global_credential", &self.global_credential.is_some())
            .finish()
    }
}

impl ProviderEndpoint {
    /// Validate and normalize the base URL. Empty credentials count as absent.
    pub fn new(
        base_url: &str,
        auth_mode: AuthMode,
        global_credential: Option<String>,
    ) -> Result<Self, ConfigError> {
        Ok(ProviderEndpoint {
            base_url: normalize_base_url(base_url)?,
            auth_mode,
            global_credential: non_empty(global_credential),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth_mode
    }

    pub fn global_credential(&self) -> Option<&str> {
        self.global_credential.as_deref()
    }

    /// `GET` target for model discovery.
    pub fn models_url(&self) -> String {
        format!("{}/models", self.base_url)
    }

    /// `POST` target for chat completions.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Strip trailing slashes and make sure the path carries a `/v1` segment.
///
/// Only absolute `http`/`https` URLs with a host are accepted.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidBaseUrl {
        url: openllm_core::utils::sanitize_url(raw),
        reason: reason.to_string(),
    };

    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }

    let parsed = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }

    if trimmed.contains("/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/v1"))
    }
}

// ─────────────────────────────────────────────
// ModelEntry
// ─────────────────────────────────────────────

/// Generation parameters sent with every request for a model.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f64,
    /// Opaque passthrough parameters.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A configured model.
#[derive(Clone)]
pub struct ModelEntry {
    pub id: String,
    pub display_name: String,
    credential: Option<String>,
    pub params: GenerationParams,
}

impl std::fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEntry")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("has_credential", &self.credential.is_some())
            .field("params", &self.params)
            .finish()
    }
}

impl ModelEntry {
    /// Build and validate an entry from its configuration record.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ConfigError> {
        let id = config.id.trim();
        if id.is_empty() {
            return Err(ConfigError::InvalidModel {
                model: config.id.clone(),
                reason: "empty model id".to_string(),
            });
        }
        let invalid = |reason: String| ConfigError::InvalidModel {
            model: id.to_string(),
            reason,
        };

        if config.max_tokens == 0 {
            return Err(invalid("maxTokens must be positive".to_string()));
        }
        if !(0.0..=2.0).contains(&config.temperature) {
            return Err(invalid(format!(
                "temperature {} outside 0.0–2.0",
                config.temperature
            )));
        }
        if let Some(key) = RESERVED_PARAMS
            .iter()
            .find(|k| config.extra_params.contains_key(**k))
        {
            return Err(invalid(format!("extraParams may not set '{key}'")));
        }

        Ok(ModelEntry {
            id: id.to_string(),
            display_name: config
                .display_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| id.to_string()),
            credential: non_empty(config.api_key.clone()),
            params: GenerationParams {
                max_tokens: config.max_tokens,
                temperature: config.temperature,
                extra: config.extra_params.clone(),
            },
        })
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }
}

// ─────────────────────────────────────────────
// ModelRegistry
// ─────────────────────────────────────────────

/// Credential and parameters that apply to one request.
#[derive(Clone, Debug)]
pub struct ResolvedModel<'a> {
    pub id: &'a str,
    pub credential: Option<&'a str>,
    pub params: &'a GenerationParams,
}

/// Immutable set of models for one endpoint.
#[derive(Clone, Debug)]
pub struct ModelRegistry {
    endpoint: ProviderEndpoint,
    models: Vec<ModelEntry>,
    default_model: String,
}

impl ModelRegistry {
    /// Validate the model set against the endpoint's auth mode.
    ///
    /// `default_model` falls back to the first entry.
    pub fn new(
        endpoint: ProviderEndpoint,
        models: Vec<ModelEntry>,
        default_model: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let first = models.first().ok_or(ConfigError::NoModels)?;
        let default_model = default_model.unwrap_or(&first.id).to_string();

        {
            let mut seen = HashSet::new();
            for entry in &models {
                if !seen.insert(entry.id.as_str()) {
                    return Err(ConfigError::DuplicateModel(entry.id.clone()));
                }
                if endpoint.auth_mode == AuthMode::PerModel && entry.credential.is_none() {
                    return Err(ConfigError::MissingModelCredential(entry.id.clone()));
                }
            }
            if !seen.contains(default_model.as_str()) {
                return Err(ConfigError::ModelNotConfigured(default_model));
            }
        }

        debug!(
            endpoint = %openllm_core::utils::sanitize_url(&endpoint.base_url),
            auth_mode = ?endpoint.auth_mode,
            models = models.len(),
            default_model = %default_model,
            "Model registry built"
        );

        Ok(ModelRegistry {
            endpoint,
            models,
            default_model,
        })
    }

    /// Build the registry described by a configuration record.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let endpoint =
            ProviderEndpoint::new(&config.base_url, config.auth_mode, config.api_key.clone())?;
        let models = config
            .models
            .iter()
            .map(ModelEntry::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(endpoint, models, config.model.as_deref())
    }

    /// Credential and parameters for `model_id`.
    pub fn resolve(&self, model_id: &str) -> Result<ResolvedModel<'_>, ConfigError> {
        let entry = self
            .get(model_id)
            .ok_or_else(|| ConfigError::ModelNotConfigured(model_id.to_string()))?;

        let credential = match self.endpoint.auth_mode {
            AuthMode::Global => self.endpoint.global_credential(),
            AuthMode::PerModel => entry.credential.as_deref(),
        };

        Ok(ResolvedModel {
            id: &entry.id,
            credential,
            params: &entry.params,
        })
    }

    /// Ask the endpoint which models it serves.
    ///
    /// Advisory only: the result is never merged into this registry.
    pub async fn discover(
        &self,
        transport: &dyn ChatTransport,
        timeout: Duration,
    ) -> Result<Discovery, RequestError> {
        // Per-model mode has no endpoint-wide key; the default model's one is used.
        let credential = self
            .resolve(&self.default_model)
            .ok()
            .and_then(|r| r.credential);
        transport
            .list_models(&self.endpoint, credential, timeout)
            .await
    }

    pub fn get(&self, model_id: &str) -> Option<&ModelEntry> {
        self.models.iter().find(|m| m.id == model_id)
    }

    pub fn models(&self) -> &[ModelEntry] {
        &self.models
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn endpoint(&self) -> &ProviderEndpoint {
        &self.endpoint
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
