//! Scripted in-memory transport shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use openllm_core::config::{Config, ModelConfig};
use openllm_core::types::{Completion, Discovery, Message, UsageInfo};
use openllm_core::{RequestError, RequestOutcome};
use openllm_providers::{ChatRequest, ChatTransport, ProviderEndpoint};

/// What the transport does on its next call.
pub enum Step {
    Reply(&'static str),
    Fail(RequestError),
    /// Reply after sleeping.
    Delayed(Duration, &'static str),
    /// Never answer.
    Hang,
}

/// A request as the transport saw it.
#[derive(Clone, Debug)]
pub struct Captured {
    pub model: String,
    pub credential: Option<String>,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// Plays back `Step`s in order; replies "ok" once the script runs out.
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<Captured>>,
    pub started: Notify,
    discovery: Mutex<Option<Discovery>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
            started: Notify::new(),
            discovery: Mutex::new(None),
        }
    }

    pub fn with_discovery(self, discovery: Discovery) -> Self {
        *self.discovery.lock().unwrap() = Some(discovery);
        self
    }

    pub fn calls(&self) -> Vec<Captured> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn completion(text: &str) -> Completion {
    Completion {
        content: text.to_string(),
        usage: Some(UsageInfo {
            prompt_tokens: 10,
            completion_tokens: 2,
            total_tokens: 12,
        }),
        finish_reason: Some("stop".into()),
        model: None,
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn list_models(
        &self,
        _endpoint: &ProviderEndpoint,
        _credential: Option<&str>,
        _timeout: Duration,
    ) -> Result<Discovery, RequestError> {
        Ok(self
            .discovery
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Discovery::Unsupported { status: Some(404) }))
    }

    async fn complete_chat(
        &self,
        _endpoint: &ProviderEndpoint,
        request: &ChatRequest<'_>,
    ) -> RequestOutcome {
        self.calls.lock().unwrap().push(Captured {
            model: request.model.to_string(),
            credential: request.credential.map(String::from),
            messages: request.messages.to_vec(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        });
        self.started.notify_one();

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            None => Ok(completion("ok")),
            Some(Step::Reply(text)) => Ok(completion(text)),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(completion(text))
            }
            Some(Step::Hang) => std::future::pending::<RequestOutcome>().await,
        }
    }
}

/// Global-mode config with one model and no credential.
pub fn test_config() -> Config {
    Config {
        base_url: "http://localhost:4000".to_string(),
        models: vec![ModelConfig::new("gpt-4o")],
        system_prompt: "You are helpful.".to_string(),
        ..Config::default()
    }
}
