//! Core building blocks for OpenLLM Conversation.
//!
//! - [`types`] — OpenAI chat-completions wire types and turn roles
//! - [`error`] — request and configuration error taxonomy
//! - [`config`] — configuration record schema, loader, and validation
//! - [`session`] — per-conversation history store and windowing
//! - [`utils`] — paths, truncation, URL sanitizing

pub mod config;
pub mod error;
pub mod session;
pub mod types;
pub mod utils;

pub use error::{ConfigError, RequestError, RequestOutcome};
