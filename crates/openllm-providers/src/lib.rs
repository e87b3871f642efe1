//! Provider layer for OpenLLM Conversation.
//!
//! # Architecture
//!
//! - [`traits::ChatTransport`] — the two upstream operations (list models, chat completion)
//! - [`http_transport::HttpTransport`] — `reqwest` implementation for OpenAI-compatible APIs
//! - [`registry::ModelRegistry`] — configured models, credential resolution, discovery

pub mod http_transport;
pub mod registry;
pub mod traits;

// Re-export main types for convenience
pub use http_transport::HttpTransport;
pub use registry::{GenerationParams, ModelEntry, ModelRegistry, ProviderEndpoint, ResolvedModel};
pub use traits::{ChatRequest, ChatTransport};
