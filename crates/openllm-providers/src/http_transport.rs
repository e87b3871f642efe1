//! HTTP transport for OpenAI-compatible APIs.
//!
//! Talks to any `/models` + `/chat/completions` endpoint (LiteLLM, Ollama,
//! LocalAI, vLLM, gateway aggregators) through a shared `reqwest` client.
//! Every failure is classified into a [`RequestError`] here; nothing from
//! the HTTP stack escapes in any other form.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use tracing::{debug, error, warn};

use openllm_core::types::{
    ChatCompletionRequest, ChatCompletionResponse, Completion, Discovery, ModelListResponse,
};
use openllm_core::utils::{sanitize_url, truncate_string};
use openllm_core::{RequestError, RequestOutcome};

use crate::registry::ProviderEndpoint;
use crate::traits::{ChatRequest, ChatTransport};

/// Error bodies are cut to this many characters before being surfaced.
pub const MAX_ERROR_BODY_CHARS: usize = 512;

// ─────────────────────────────────────────────
// HttpTransport
// ─────────────────────────────────────────────

/// Stateless transport over a shared, connection-pooled HTTP client.
///
/// Timeouts are applied per request, so one transport serves endpoints with
/// different timeout settings.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("openllm-conversation/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build configured HTTP client, using defaults");
                reqwest::Client::new()
            });

        HttpTransport { client }
    }

    /// Use an existing client (shares its connection pool).
    pub fn with_client(client: reqwest::Client) -> Self {
        HttpTransport { client }
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn list_models(
        &self,
        endpoint: &ProviderEndpoint,
        credential: Option<&str>,
        timeout: Duration,
    ) -> Result<Discovery, RequestError> {
        let safe_url = sanitize_url(endpoint.base_url());
        debug!(endpoint = %safe_url, "Fetching models");

        let mut builder = self.client.get(endpoint.models_url()).timeout(timeout);
        if let Some(key) = credential {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(endpoint = %safe_url, error = %e, "Model listing failed");
            classify_reqwest_error(&e)
        })?;

        let status = response.status();
        if !status.is_success() {
            debug!(endpoint = %safe_url, status = %status, "Model listing not supported");
            return Ok(Discovery::Unsupported {
                status: Some(status.as_u16()),
            });
        }

        let body = response.text().await.map_err(|e| classify_reqwest_error(&e))?;
        match serde_json::from_str::<ModelListResponse>(&body) {
            Ok(list) => {
                let ids: Vec<String> = list.data.into_iter().map(|m| m.id).collect();
                debug!(endpoint = %safe_url, count = ids.len(), "Found models");
                Ok(Discovery::Available(ids))
            }
            Err(e) => {
                debug!(endpoint = %safe_url, error = %e, "Unexpected model listing shape");
                Ok(Discovery::Unsupported { status: None })
            }
        }
    }

    async fn complete_chat(
        &self,
        endpoint: &ProviderEndpoint,
        request: &ChatRequest<'_>,
    ) -> RequestOutcome {
        let safe_url = sanitize_url(endpoint.base_url());

        debug!(
            endpoint = %safe_url,
            model = request.model,
            messages = request.messages.len(),
            authenticated = request.credential.is_some(),
            "Sending chat completion request"
        );

        let body = ChatCompletionRequest {
            model: request.model.to_string(),
            messages: request.messages.to_vec(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            extra: request.extra_params.clone(),
        };

        let mut builder = self
            .client
            .post(endpoint.completions_url())
            .timeout(request.timeout)
            .json(&body);
        if let Some(key) = request.credential {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            error!(endpoint = %safe_url, error = %e, "HTTP request failed");
            classify_reqwest_error(&e)
        })?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers(), Utc::now());
        let text = response.text().await.map_err(|e| {
            error!(endpoint = %safe_url, error = %e, "Failed to read response body");
            classify_reqwest_error(&e)
        })?;

        if !status.is_success() {
            let err = classify_status(status, retry_after, request.model, &text);
            error!(
                endpoint = %safe_url,
                status = %status,
                kind = err.kind(),
                body = %truncate_string(&text, MAX_ERROR_BODY_CHARS),
                "API error"
            );
            return Err(err);
        }

        let completion = parse_completion(&text).ok_or_else(|| {
            error!(endpoint = %safe_url, "Response has no choices[0].message.content");
            RequestError::Upstream {
                status: status.as_u16(),
                body: truncate_string(&text, MAX_ERROR_BODY_CHARS),
            }
        })?;

        debug!(
            endpoint = %safe_url,
            chars = completion.content.len(),
            finish_reason = completion.finish_reason.as_deref().unwrap_or("?"),
            "Chat completion received"
        );
        Ok(completion)
    }
}

// ─────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────

fn classify_reqwest_error(e: &reqwest::Error) -> RequestError {
    if e.is_timeout() {
        RequestError::Timeout
    } else {
        RequestError::Transport(e.to_string())
    }
}

/// Map a non-success status to its error class.
fn classify_status(
    status: StatusCode,
    retry_after: Option<u64>,
    model: &str,
    body: &str,
) -> RequestError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RequestError::Auth {
            status: status.as_u16(),
        },
        StatusCode::NOT_FOUND => RequestError::NotFound {
            model: model.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => RequestError::RateLimited { retry_after },
        _ => RequestError::Upstream {
            status: status.as_u16(),
            body: truncate_string(body, MAX_ERROR_BODY_CHARS),
        },
    }
}

/// `Retry-After` as whole seconds: either delta-seconds or an HTTP-date.
fn parse_retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<u64> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let secs = (at.with_timezone(&Utc) - now).num_seconds();
    Some(secs.max(0) as u64)
}

fn parse_completion(body: &str) -> Option<Completion> {
    serde_json::from_str::<ChatCompletionResponse>(body)
        .ok()?
        .into_completion()
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
