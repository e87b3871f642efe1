//! Conversation history — a bounded, ordered log of turns per conversation.
//!
//! Each conversation owns one [`HistoryStore`]. The store is never shared
//! between conversations and has no external writer.

pub mod history;

pub use history::{HistoryStore, Turn};
