//! AI task generation: one-shot, history-free requests.
//!
//! The reply is returned as text, or parsed as JSON when structured output is
//! asked for. Replies that are not valid JSON are wrapped as `{"text": ...}`
//! instead of failing the task.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, warn};

use openllm_core::types::Message;
use openllm_core::utils::truncate_string;

use crate::conversation::{ConversationAgent, TurnError};
use crate::retry::Attempted;

pub const TASK_SYSTEM_PROMPT: &str = "You are a Home Assistant AI assistant that helps users with tasks. \
Follow the user's instructions precisely. \
When asked to generate structured data, respond with valid JSON only.";

const STRUCTURED_SUFFIX: &str = "\n\nYou must respond with valid JSON matching the requested structure. \
Do not include any text outside of the JSON object.";

static JSON_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").ok());

/// Generated task data.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskOutput {
    /// A JSON string for free-text tasks, the parsed document otherwise.
    pub data: Value,
    pub attempts: u32,
}

impl ConversationAgent {
    /// Run a task against the default model.
    pub async fn generate_data(
        &self,
        instructions: &str,
        structured: bool,
    ) -> Result<TaskOutput, TurnError> {
        let snapshot = self.snapshot().await;
        let resolved = snapshot.registry.resolve(snapshot.registry.default_model())?;

        let mut system_prompt = TASK_SYSTEM_PROMPT.to_string();
        if structured {
            system_prompt.push_str(STRUCTURED_SUFFIX);
        }
        let messages = [Message::system(system_prompt), Message::user(instructions)];

        debug!(model = resolved.id, structured, "Generating task data");
        let Attempted { outcome, attempts } =
            self.complete_with_retry(&snapshot, &resolved, &messages).await;
        let completion = outcome.map_err(|e| {
            warn!(kind = e.kind(), error = %e, "AI task failed");
            TurnError::from(e)
        })?;

        let data = if structured {
            parse_structured(&completion.content)
        } else {
            Value::String(completion.content)
        };
        Ok(TaskOutput { data, attempts })
    }
}

/// Parse a JSON reply, unwrapping a fenced code block first.
fn parse_structured(reply: &str) -> Value {
    let candidate = fenced_block(reply).unwrap_or_else(|| reply.trim());
    match serde_json::from_str(candidate) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                error = %e,
                reply = %truncate_string(reply, 100),
                "Failed to parse JSON response, returning raw text"
            );
            json!({ "text": reply })
        }
    }
}

fn fenced_block(reply: &str) -> Option<&str> {
    JSON_FENCE.as_ref()?.captures(reply)?.get(1).map(|m| m.as_str())
}
