//! Wire types for OpenAI-compatible endpoints.
//!
//! Only the subset this system speaks is modelled: plain-text chat messages,
//! the `/chat/completions` request and response, and the `/models` listing.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Roles & messages
// ─────────────────────────────────────────────

/// Author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat message as sent upstream: `{"role": ..., "content": ...}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Message {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

// ─────────────────────────────────────────────
// Chat completion
// ─────────────────────────────────────────────

/// Request body for `POST {base}/chat/completions`.
///
/// `extra` is the per-model escape hatch: its keys are flattened into the
/// top-level object verbatim. Reserved keys are rejected at configuration
/// time so they never collide with the typed fields.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Raw chat completion response. Used internally for deserialization.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: AssistantMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage statistics reported by the upstream.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageInfo {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// A successful completion: the assistant text plus metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
    /// Model id echoed by the upstream, when it sends one.
    pub model: Option<String>,
}

impl ChatCompletionResponse {
    /// Pull the assistant text out of `choices[0].message.content`.
    ///
    /// Returns `None` when the response does not have that shape.
    pub fn into_completion(self) -> Option<Completion> {
        let choice = self.choices.into_iter().next()?;
        let content = choice.message.content?;
        Some(Completion {
            content,
            usage: self.usage,
            finish_reason: choice.finish_reason,
            model: self.model,
        })
    }
}

// ─────────────────────────────────────────────
// Model discovery
// ─────────────────────────────────────────────

/// Body of `GET {base}/models`.
#[derive(Debug, Deserialize)]
pub struct ModelListResponse {
    pub data: Vec<ModelDescriptor>,
}

#[derive(Debug, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
}

/// Result of a model discovery call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Discovery {
    /// Model ids reported by the upstream, in upstream order.
    Available(Vec<String>),
    /// The upstream does not offer a usable listing; fall back to manual entry.
    /// `status` is set when the upstream answered with a non-success code.
    Unsupported { status: Option<u16> },
}

impl Discovery {
    pub fn is_supported(&self) -> bool {
        matches!(self, Discovery::Available(_))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_serialization() {
        let msg = Message::system("You are a helpful assistant.");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"role": "system", "content": "You are a helpful assistant."}));
    }

    #[test]
    fn test_request_flattens_extra_params() {
        let mut extra = serde_json::Map::new();
        extra.insert("top_p".into(), json!(0.9));
        extra.insert("stop".into(), json!(["\n\n"]));

        let req = ChatCompletionRequest {
            model: "llama3".into(),
            messages: vec![Message::user("Hi")],
            max_tokens: 256,
            temperature: 0.2,
            extra,
        };
        let value = serde_json::to_value(&req).unwrap();

        assert_eq!(value["model"], "llama3");
        assert_eq!(value["max_tokens"], 256);
        assert_eq!(value["top_p"], 0.9);
        assert_eq!(value["stop"][0], "\n\n");
        assert_eq!(value["messages"][0]["role"], "user");
        assert!(value.get("extra").is_none());
    }

    #[test]
    fn test_response_into_completion() {
        let resp: ChatCompletionResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{
                "message": {"role": "assistant", "content": "The lights are on."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
        }))
        .unwrap();

        let completion = resp.into_completion().unwrap();
        assert_eq!(completion.content, "The lights are on.");
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
        assert_eq!(completion.usage.unwrap().total_tokens, 17);
        assert_eq!(completion.model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn test_response_without_choices_has_no_completion() {
        let resp: ChatCompletionResponse =
            serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(resp.into_completion().is_none());

        let resp: ChatCompletionResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": null}}]})).unwrap();
        assert!(resp.into_completion().is_none());
    }

    #[test]
    fn test_model_list_requires_data_field() {
        let ok: Result<ModelListResponse, _> =
            serde_json::from_value(json!({"object": "list", "data": [{"id": "a"}, {"id": "b"}]}));
        assert_eq!(ok.unwrap().data.len(), 2);

        let missing: Result<ModelListResponse, _> = serde_json::from_value(json!({"models": []}));
        assert!(missing.is_err());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(serde_json::to_value(Role::User).unwrap(), "user");
    }
}
