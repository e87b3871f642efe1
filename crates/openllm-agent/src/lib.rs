//! OpenLLM Agent — conversation turns on top of the provider layer.
//!
//! This crate contains:
//! - **conversation**: the session manager (`ConversationAgent`) and its turn state machine
//! - **retry**: retry/backoff policy for transient transport failures
//! - **task**: stateless AI task generation (free text or JSON)

pub mod conversation;
pub mod retry;
pub mod task;

#[cfg(test)]
mod testing;

pub use conversation::{
    ConversationAgent, Settings, Snapshot, TurnError, TurnReply, TurnRequest, TurnResult,
    TurnState,
};
pub use retry::{Attempted, RetryPolicy};
pub use task::TaskOutput;
