//! Per-conversation turn log and windowing.
//!
//! The store is an append-only ordered log. Windowing groups the log into
//! *exchanges* (a user turn plus the assistant turn that immediately follows
//! it) and keeps the most recent ones; eviction is by exchange count only,
//! never by tokens.

use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Message, Role};

// ─────────────────────────────────────────────
// Turn
// ─────────────────────────────────────────────

/// One message in a conversation. Never mutated after creation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Monotonic within a store; assigned at append time.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Wire representation of this turn.
    pub fn to_message(&self) -> Message {
        Message::new(self.role, self.content.clone())
    }
}

// ─────────────────────────────────────────────
// HistoryStore
// ─────────────────────────────────────────────

/// Ordered log of the turns of one conversation.
#[derive(Clone, Debug, Default)]
pub struct HistoryStore {
    turns: Vec<Turn>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn. Its sequence number is the previous maximum + 1, or 0
    /// for an empty store.
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> &Turn {
        let seq = self.turns.last().map_or(0, |t| t.seq + 1);
        self.turns.push(Turn {
            role,
            content: content.into(),
            seq,
            timestamp: Utc::now(),
        });
        &self.turns[self.turns.len() - 1]
    }

    /// System turn followed by the last `context_messages` exchanges, oldest
    /// first.
    ///
    /// A trailing unanswered user turn is always included as the final entry
    /// and does not count against `context_messages`.
    pub fn window(&self, context_messages: usize, system_prompt: &str) -> Vec<Turn> {
        let mut exchanges = self.exchanges();

        let unanswered = matches!(
            exchanges.last(),
            Some(last) if last.len() == 1 && self.turns[last.start].role == Role::User
        );
        let trailing = if unanswered { exchanges.pop() } else { None };

        let skip = exchanges.len().saturating_sub(context_messages);

        let mut window = Vec::with_capacity(2 * context_messages + 2);
        window.push(Turn {
            role: Role::System,
            content: system_prompt.to_string(),
            seq: 0,
            timestamp: DateTime::<Utc>::default(),
        });
        for range in exchanges.into_iter().skip(skip).chain(trailing) {
            window.extend_from_slice(&self.turns[range]);
        }
        window
    }

    /// Drop the oldest exchanges until at most `max_exchanges` remain.
    pub fn evict_to(&mut self, max_exchanges: usize) {
        let exchanges = self.exchanges();
        if exchanges.len() <= max_exchanges {
            return;
        }
        let first_kept = exchanges
            .get(exchanges.len() - max_exchanges)
            .map_or(self.turns.len(), |r| r.start);
        self.turns.drain(..first_kept);
    }

    /// Remove every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Split the non-system turns into exchanges, as index ranges.
    ///
    /// A user turn opens an exchange and absorbs the assistant turn directly
    /// after it; any other turn forms an exchange of its own.
    fn exchanges(&self) -> Vec<Range<usize>> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < self.turns.len() {
            let role = self.turns[i].role;
            if role == Role::System {
                i += 1;
                continue;
            }
            let paired = role == Role::User
                && self
                    .turns
                    .get(i + 1)
                    .is_some_and(|next| next.role == Role::Assistant);
            let len = if paired { 2 } else { 1 };
            out.push(i..i + len);
            i += len;
        }
        out
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
