//! Error taxonomy shared by every layer.
//!
//! [`RequestError`] is the closed set of failures the transport can report.
//! Nothing raised by the HTTP stack crosses the transport boundary in any
//! other shape. [`ConfigError`] covers malformed or incomplete configuration
//! records and is only produced while building a snapshot.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::Completion;

/// Wait hint surfaced for HTTP 429 responses that carry no `Retry-After`.
pub const DEFAULT_RATE_LIMIT_HINT_SECS: u64 = 5;

/// Result of a single chat-completion attempt.
pub type RequestOutcome = Result<Completion, RequestError>;

// ─────────────────────────────────────────────
// RequestError
// ─────────────────────────────────────────────

/// Classified failure of one upstream request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    /// HTTP 401/403 — the credential is missing, wrong, or not authorized.
    #[error("authentication failed (HTTP {status})")]
    Auth { status: u16 },

    /// HTTP 404 — the upstream does not know this model id.
    #[error("model '{model}' not found upstream")]
    NotFound { model: String },

    /// HTTP 429. `retry_after` is `None` when the upstream sent no usable
    /// `Retry-After` header.
    #[error(
        "rate limited, retry after {}s",
        .retry_after.unwrap_or(DEFAULT_RATE_LIMIT_HINT_SECS)
    )]
    RateLimited { retry_after: Option<u64> },

    /// Connect or read timeout, or the per-turn budget ran out.
    #[error("request timed out")]
    Timeout,

    /// Any other network-level failure (DNS, refused connection, TLS, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// Any other non-success status, or a 2xx body without the expected shape.
    #[error("upstream error (HTTP {status}): {body}")]
    Upstream { status: u16, body: String },
}

impl RequestError {
    /// Whether the failure class is worth retrying automatically.
    pub fn is_transient(&self) -> bool {
        matches!(self, RequestError::Timeout | RequestError::Transport(_))
    }

    /// How long the caller should wait before trying again, for rate limits.
    pub fn wait_hint(&self) -> Option<Duration> {
        match self {
            RequestError::RateLimited { retry_after } => Some(Duration::from_secs(
                retry_after.unwrap_or(DEFAULT_RATE_LIMIT_HINT_SECS),
            )),
            _ => None,
        }
    }

    /// Stable short name for logs and host-side rendering.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::Auth { .. } => "auth_error",
            RequestError::NotFound { .. } => "not_found",
            RequestError::RateLimited { .. } => "rate_limited",
            RequestError::Timeout => "timeout",
            RequestError::Transport(_) => "transport_error",
            RequestError::Upstream { .. } => "upstream_error",
        }
    }
}

// ─────────────────────────────────────────────
// ConfigError
// ─────────────────────────────────────────────

/// A configuration record that cannot back a session.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("no models configured")]
    NoModels,

    #[error("duplicate model id '{0}'")]
    DuplicateModel(String),

    #[error("model '{0}' has no API key but auth mode is per-model")]
    MissingModelCredential(String),

    #[error("model '{model}': {reason}")]
    InvalidModel { model: String, reason: String },

    #[error("model '{0}' is not configured")]
    ModelNotConfigured(String),

    #[error("invalid {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeout_and_transport_are_transient() {
        assert!(RequestError::Timeout.is_transient());
        assert!(RequestError::Transport("refused".into()).is_transient());
        assert!(!RequestError::Auth { status: 401 }.is_transient());
        assert!(!RequestError::NotFound { model: "m".into() }.is_transient());
        assert!(!RequestError::RateLimited { retry_after: None }.is_transient());
        assert!(!RequestError::Upstream { status: 500, body: String::new() }.is_transient());
    }

    #[test]
    fn test_wait_hint_uses_default_without_header() {
        let err = RequestError::RateLimited { retry_after: None };
        assert_eq!(
            err.wait_hint(),
            Some(Duration::from_secs(DEFAULT_RATE_LIMIT_HINT_SECS))
        );
        let err = RequestError::RateLimited { retry_after: Some(20) };
        assert_eq!(err.wait_hint(), Some(Duration::from_secs(20)));
        assert_eq!(RequestError::Timeout.wait_hint(), None);
    }

    #[test]
    fn test_rate_limited_display() {
        let err = RequestError::RateLimited { retry_after: Some(20) };
        assert_eq!(err.to_string(), "rate limited, retry after 20s");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingModelCredential("gpt-4o".into());
        assert!(err.to_string().contains("gpt-4o"));
        assert!(err.to_string().contains("per-model"));
    }
}
