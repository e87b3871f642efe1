//! Retry policy for chat completion calls.
//!
//! Only `Timeout` and `Transport` failures are retried. Every call of a turn
//! runs under one wall-clock budget of `attempt_timeout * (1 + max_retries)`;
//! running out of it is reported as `Timeout`.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use openllm_core::config::Config;
use openllm_core::{RequestError, RequestOutcome};

use crate::conversation::TurnState;

/// How often and how patiently a request is attempted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub base_delay: Duration,
    /// Timeout applied to each individual request.
    pub attempt_timeout: Duration,
}

/// Final outcome of a retried call plus the number of transport calls made.
#[derive(Clone, Debug, PartialEq)]
pub struct Attempted {
    pub outcome: RequestOutcome,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        RetryPolicy {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            attempt_timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    /// Sleep before retry number `retry` (1-based): `base_delay * 2^(retry-1)`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Wall-clock budget for all attempts together.
    pub fn budget(&self) -> Duration {
        self.attempt_timeout
            .saturating_mul(self.max_retries.saturating_add(1))
    }

    /// Run `call` until it succeeds, fails permanently, or retries run out.
    ///
    /// `call` receives the 1-based attempt number.
    pub async fn run<F, Fut>(&self, mut call: F) -> Attempted
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = RequestOutcome>,
    {
        let mut attempts = 0u32;
        let budget = self.budget();

        let bounded = tokio::time::timeout(budget, async {
            loop {
                attempts += 1;
                match call(attempts).await {
                    Err(e) if e.is_transient() && attempts <= self.max_retries => {
                        let delay = self.backoff(attempts);
                        debug!(
                            state = %TurnState::Retrying,
                            attempt = attempts,
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "Transient failure, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    outcome => return outcome,
                }
            }
        })
        .await;

        let outcome = bounded.unwrap_or_else(|_| {
            warn!(
                budget_ms = budget.as_millis() as u64,
                attempts, "Request budget exhausted"
            );
            Err(RequestError::Timeout)
        });

        Attempted { outcome, attempts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openllm_core::types::Completion;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(30),
        }
    }

    fn ok(text: &str) -> RequestOutcome {
        Ok(Completion {
            content: text.to_string(),
            usage: None,
            finish_reason: None,
            model: None,
        })
    }

    #[test]
    fn test_backoff_doubles() {
        let p = policy(5);
        assert_eq!(p.backoff(1), Duration::from_millis(500));
        assert_eq!(p.backoff(2), Duration::from_millis(1000));
        assert_eq!(p.backoff(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_budget_scales_with_retries() {
        assert_eq!(policy(0).budget(), Duration::from_secs(30));
        assert_eq!(policy(2).budget(), Duration::from_secs(90));
    }

    #[test]
    fn test_from_config_defaults() {
        let p = RetryPolicy::from_config(&Config::default());
        assert_eq!(p, policy(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_use_every_retry() {
        let calls = AtomicU32::new(0);
        let attempted = policy(3)
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(RequestError::Timeout) }
            })
            .await;

        assert_eq!(attempted.outcome, Err(RequestError::Timeout));
        assert_eq!(attempted.attempts, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transport_error() {
        let attempted = policy(1)
            .run(|attempt| async move {
                if attempt == 1 {
                    Err(RequestError::Transport("connection reset".into()))
                } else {
                    ok("recovered")
                }
            })
            .await;

        assert_eq!(attempted.attempts, 2);
        assert_eq!(attempted.outcome.unwrap().content, "recovered");
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failures_are_not_retried() {
        for err in [
            RequestError::Auth { status: 401 },
            RequestError::NotFound { model: "m".into() },
            RequestError::RateLimited { retry_after: Some(20) },
            RequestError::Upstream { status: 500, body: String::new() },
        ] {
            let attempted = policy(3).run(|_| async { Err(err.clone()) }).await;
            assert_eq!(attempted.attempts, 1);
            assert_eq!(attempted.outcome, Err(err));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_is_timeout() {
        let attempted = policy(1)
            .run(|_| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                ok("too late")
            })
            .await;

        assert_eq!(attempted.outcome, Err(RequestError::Timeout));
        assert_eq!(attempted.attempts, 1);
    }
}
