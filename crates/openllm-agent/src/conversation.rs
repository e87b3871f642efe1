//! Session manager — runs one conversation turn end to end.
//!
//! A turn moves through `Idle → Resolving → Requesting → (Retrying)* →
//! Completed | Failed`:
//!
//! 1. resolve the model and credential (no history change on failure)
//! 2. append the user turn and build the context window
//! 3. call the transport under the retry policy
//! 4. on success append the assistant turn, on failure keep only the user turn
//!
//! Configuration lives in an immutable [`Snapshot`] behind an `Arc`. A
//! reconfiguration swaps the `Arc`; turns already in flight finish on the
//! snapshot they started with.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use openllm_core::config::{BusyPolicy, Config};
use openllm_core::session::{HistoryStore, Turn};
use openllm_core::types::{Discovery, Message, Role, UsageInfo};
use openllm_core::{ConfigError, RequestError};
use openllm_providers::{ChatRequest, ChatTransport, ModelRegistry, ResolvedModel};

use crate::retry::{Attempted, RetryPolicy};

/// Conversations idle for longer than this are dropped.
pub const CONVERSATION_TTL_HOURS: i64 = 24;
/// Upper bound on tracked conversations; least recently used go first.
pub const MAX_CONVERSATIONS: usize = 100;
/// Exchanges kept per conversation beyond the context window.
pub const RETAINED_EXTRA_EXCHANGES: usize = 5;

// ─────────────────────────────────────────────
// Turn state & results
// ─────────────────────────────────────────────

/// Where a turn is in its lifecycle. Only used for logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Resolving,
    Requesting,
    Retrying,
    Completed,
    Failed,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnState::Idle => "idle",
            TurnState::Resolving => "resolving",
            TurnState::Requesting => "requesting",
            TurnState::Retrying => "retrying",
            TurnState::Completed => "completed",
            TurnState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a turn produced no assistant reply.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("conversation is busy with another turn")]
    Busy,

    #[error("turn cancelled")]
    Cancelled,
}

impl TurnError {
    /// Short text suitable for showing to the person talking to the agent.
    pub fn user_message(&self) -> String {
        format!("Error communicating with AI: {self}")
    }
}

/// One incoming utterance.
#[derive(Clone, Debug, Default)]
pub struct TurnRequest {
    /// Existing conversation to continue; a new id is generated when absent.
    pub conversation_id: Option<String>,
    pub text: String,
    /// Overrides the configured default model for this turn.
    pub model: Option<String>,
}

impl TurnRequest {
    pub fn new(text: impl Into<String>) -> Self {
        TurnRequest {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Assistant reply of a completed turn.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnReply {
    pub text: String,
    pub usage: Option<UsageInfo>,
    /// Model the reply was requested from.
    pub model: String,
    /// Transport calls made, including retries.
    pub attempts: u32,
}

/// Outcome of `process_turn`; always carries the conversation id.
#[derive(Debug)]
pub struct TurnResult {
    pub conversation_id: String,
    pub outcome: Result<TurnReply, TurnError>,
}

// ─────────────────────────────────────────────
// Snapshot
// ─────────────────────────────────────────────

/// Conversation settings taken from the configuration record.
#[derive(Clone, Debug)]
pub struct Settings {
    pub system_prompt: String,
    pub context_messages: usize,
    pub retry: RetryPolicy,
    pub busy_policy: BusyPolicy,
}

/// Immutable view of one configuration: models plus settings.
#[derive(Debug)]
pub struct Snapshot {
    pub registry: ModelRegistry,
    pub settings: Settings,
}

impl Snapshot {
    /// Validate `config` and build the snapshot it describes.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = ModelRegistry::from_config(config)?;
        Ok(Snapshot {
            registry,
            settings: Settings {
                system_prompt: config.system_prompt.clone(),
                context_messages: config.context_messages,
                retry: RetryPolicy::from_config(config),
                busy_policy: config.busy_policy,
            },
        })
    }
}

// ─────────────────────────────────────────────
// ConversationAgent
// ─────────────────────────────────────────────

struct ConversationSlot {
    history: Arc<Mutex<HistoryStore>>,
    last_used: DateTime<Utc>,
}

impl ConversationSlot {
    /// Whether a turn currently holds this conversation.
    fn is_busy(&self) -> bool {
        self.history.try_lock().is_err()
    }
}

/// Owns every conversation and runs turns against one provider endpoint.
///
/// Turns of different conversations run concurrently; turns of the same
/// conversation are serialized (or rejected, per [`BusyPolicy`]).
pub struct ConversationAgent {
    snapshot: RwLock<Arc<Snapshot>>,
    pub(crate) transport: Arc<dyn ChatTransport>,
    conversations: Mutex<HashMap<String, ConversationSlot>>,
}

impl ConversationAgent {
    /// Build an agent. Fails if the configuration cannot back a session.
    pub fn new(config: &Config, transport: Arc<dyn ChatTransport>) -> Result<Self, ConfigError> {
        let snapshot = Snapshot::from_config(config)?;
        info!(
            models = snapshot.registry.models().len(),
            default_model = snapshot.registry.default_model(),
            "Conversation agent ready"
        );
        Ok(ConversationAgent {
            snapshot: RwLock::new(Arc::new(snapshot)),
            transport,
            conversations: Mutex::new(HashMap::new()),
        })
    }

    /// The configuration currently in effect.
    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().await.clone()
    }

    /// Replace the configuration. Histories are kept; on error nothing changes.
    pub async fn reconfigure(&self, config: &Config) -> Result<(), ConfigError> {
        let snapshot = Arc::new(Snapshot::from_config(config)?);
        *self.snapshot.write().await = snapshot;
        info!("Configuration replaced");
        Ok(())
    }

    /// Ask the endpoint which models it serves.
    pub async fn discover_models(&self) -> Result<Discovery, RequestError> {
        let snapshot = self.snapshot().await;
        snapshot
            .registry
            .discover(self.transport.as_ref(), snapshot.settings.retry.attempt_timeout)
            .await
    }

    /// Run one turn to completion.
    pub async fn process_turn(&self, request: TurnRequest) -> TurnResult {
        self.process_turn_at(request, Utc::now()).await
    }

    /// Like [`process_turn`](Self::process_turn), but gives up with
    /// `TurnError::Cancelled` once `cancel` fires.
    ///
    /// The user turn stays in the history; no assistant turn is added.
    pub async fn process_turn_cancellable(
        &self,
        request: TurnRequest,
        cancel: CancellationToken,
    ) -> TurnResult {
        let conversation_id = conversation_id_for(&request);
        let outcome = tokio::select! {
            outcome = self.run_turn(&conversation_id, &request, Utc::now()) => outcome,
            _ = cancel.cancelled() => {
                debug!(conversation = %conversation_id, state = %TurnState::Failed, "Turn cancelled");
                Err(TurnError::Cancelled)
            }
        };
        TurnResult {
            conversation_id,
            outcome,
        }
    }

    /// Forget a conversation. Returns whether it existed.
    pub async fn reset_conversation(&self, conversation_id: &str) -> bool {
        let removed = self
            .conversations
            .lock()
            .await
            .remove(conversation_id)
            .is_some();
        if removed {
            debug!(conversation = conversation_id, "Conversation reset");
        }
        removed
    }

    /// Copy of the stored turns of a conversation.
    pub async fn history(&self, conversation_id: &str) -> Option<Vec<Turn>> {
        let history = self
            .conversations
            .lock()
            .await
            .get(conversation_id)
            .map(|slot| slot.history.clone())?;
        let store = history.lock().await;
        Some(store.turns().to_vec())
    }

    pub async fn conversation_count(&self) -> usize {
        self.conversations.lock().await.len()
    }

    pub(crate) async fn process_turn_at(
        &self,
        request: TurnRequest,
        now: DateTime<Utc>,
    ) -> TurnResult {
        let conversation_id = conversation_id_for(&request);
        let outcome = self.run_turn(&conversation_id, &request, now).await;
        TurnResult {
            conversation_id,
            outcome,
        }
    }

    async fn run_turn(
        &self,
        conversation_id: &str,
        request: &TurnRequest,
        now: DateTime<Utc>,
    ) -> Result<TurnReply, TurnError> {
        let snapshot = self.snapshot().await;
        let settings = &snapshot.settings;

        debug!(conversation = conversation_id, state = %TurnState::Resolving, "Turn started");
        let model_id = request
            .model
            .as_deref()
            .unwrap_or_else(|| snapshot.registry.default_model());
        let resolved = snapshot.registry.resolve(model_id).map_err(|e| {
            warn!(conversation = conversation_id, state = %TurnState::Failed, error = %e, "Model resolution failed");
            TurnError::from(e)
        })?;

        let mut history = self
            .checkout(conversation_id, now, settings.busy_policy)
            .await?;

        history.append(Role::User, request.text.clone());
        history.evict_to(settings.context_messages + RETAINED_EXTRA_EXCHANGES);
        let messages: Vec<Message> = history
            .window(settings.context_messages, &settings.system_prompt)
            .iter()
            .map(Turn::to_message)
            .collect();

        debug!(
            conversation = conversation_id,
            state = %TurnState::Requesting,
            model = resolved.id,
            messages = messages.len(),
            "Requesting completion"
        );
        let Attempted { outcome, attempts } =
            self.complete_with_retry(&snapshot, &resolved, &messages).await;

        match outcome {
            Ok(completion) => {
                history.append(Role::Assistant, completion.content.clone());
                debug!(
                    conversation = conversation_id,
                    state = %TurnState::Completed,
                    attempts,
                    "Turn completed"
                );
                Ok(TurnReply {
                    text: completion.content,
                    usage: completion.usage,
                    model: resolved.id.to_string(),
                    attempts,
                })
            }
            Err(e) => {
                warn!(
                    conversation = conversation_id,
                    state = %TurnState::Failed,
                    kind = e.kind(),
                    attempts,
                    error = %e,
                    "Turn failed"
                );
                Err(e.into())
            }
        }
    }

    /// Send `messages` to a resolved model under the snapshot's retry policy.
    pub(crate) async fn complete_with_retry(
        &self,
        snapshot: &Snapshot,
        model: &ResolvedModel<'_>,
        messages: &[Message],
    ) -> Attempted {
        let transport = self.transport.as_ref();
        let endpoint = snapshot.registry.endpoint();
        let policy = &snapshot.settings.retry;

        policy
            .run(|_| {
                let request = ChatRequest {
                    credential: model.credential,
                    model: model.id,
                    messages,
                    max_tokens: model.params.max_tokens,
                    temperature: model.params.temperature,
                    extra_params: &model.params.extra,
                    timeout: policy.attempt_timeout,
                };
                async move { transport.complete_chat(endpoint, &request).await }
            })
            .await
    }

    /// Take the history of a conversation (creating it if needed) for one turn.
    ///
    /// Expired conversations are dropped first, then the least recently used
    /// ones beyond [`MAX_CONVERSATIONS`]. Conversations with a turn in flight
    /// are never dropped. A turn rejected as busy leaves `last_used` and the
    /// conversation set untouched.
    async fn checkout(
        &self,
        conversation_id: &str,
        now: DateTime<Utc>,
        busy_policy: BusyPolicy,
    ) -> Result<OwnedMutexGuard<HistoryStore>, TurnError> {
        let mut conversations = self.conversations.lock().await;

        let ttl = chrono::Duration::hours(CONVERSATION_TTL_HOURS);
        conversations.retain(|id, slot| {
            let keep = now - slot.last_used <= ttl || slot.is_busy();
            if !keep {
                debug!(conversation = %id, "Removed expired conversation");
            }
            keep
        });

        let history = conversations
            .get(conversation_id)
            .map(|slot| slot.history.clone())
            .unwrap_or_default();

        let held = match busy_policy {
            BusyPolicy::Queue => None,
            BusyPolicy::Reject => Some(history.clone().try_lock_owned().map_err(|_| {
                debug!(conversation = conversation_id, "Conversation busy, rejecting turn");
                TurnError::Busy
            })?),
        };

        conversations.insert(
            conversation_id.to_string(),
            ConversationSlot {
                history: history.clone(),
                last_used: now,
            },
        );

        if conversations.len() > MAX_CONVERSATIONS {
            let mut idle: Vec<(String, DateTime<Utc>)> = conversations
                .iter()
                .filter(|(id, slot)| id.as_str() != conversation_id && !slot.is_busy())
                .map(|(id, slot)| (id.clone(), slot.last_used))
                .collect();
            idle.sort_by_key(|(_, last_used)| *last_used);
            let excess = conversations.len() - MAX_CONVERSATIONS;
            for (id, _) in idle.into_iter().take(excess) {
                conversations.remove(&id);
            }
            debug!(limit = MAX_CONVERSATIONS, "Trimmed conversations");
        }
        drop(conversations);

        match held {
            Some(guard) => Ok(guard),
            None => Ok(history.lock_owned().await),
        }
    }
}

fn conversation_id_for(request: &TurnRequest) -> String {
    request
        .conversation_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
