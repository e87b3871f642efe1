//! Transport trait — the seam between the session manager and the network.
//!
//! `HttpTransport` in `http_transport.rs` is the production implementation.
//! Tests substitute scripted transports to drive the session state machine.

use std::time::Duration;

use async_trait::async_trait;
use openllm_core::types::{Discovery, Message};
use openllm_core::{RequestError, RequestOutcome};

use crate::registry::ProviderEndpoint;

/// Everything needed for one chat completion call.
#[derive(Clone, Debug)]
pub struct ChatRequest<'a> {
    /// Bearer credential; `None` for unauthenticated backends.
    pub credential: Option<&'a str>,
    pub model: &'a str,
    pub messages: &'a [Message],
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
    /// Passed through into the request body verbatim.
    pub extra_params: &'a serde_json::Map<String, serde_json::Value>,
    pub timeout: Duration,
}

/// The two upstream operations.
///
/// Implementations never panic or return raw network errors: every failure
/// is a [`RequestError`] value. They never retry.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// List the model ids the endpoint advertises.
    ///
    /// Any non-success status or unexpected body is `Ok(Discovery::Unsupported)`;
    /// only network-level failures are errors.
    async fn list_models(
        &self,
        endpoint: &ProviderEndpoint,
        credential: Option<&str>,
        timeout: Duration,
    ) -> Result<Discovery, RequestError>;

    /// Send a single chat completion request.
    async fn complete_chat(
        &self,
        endpoint: &ProviderEndpoint,
        request: &ChatRequest<'_>,
    ) -> RequestOutcome;
}
