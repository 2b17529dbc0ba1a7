//! Bounded retry with delay around unreliable upstream calls.
//!
//! Long-lived streaming RPC connections drop briefly all the time, so a
//! failed call is retried after a delay. Retrying is bounded: once the
//! attempt budget is spent, or the error matches a known-fatal signature
//! (for instance a signature or decoding failure that no retry can fix), the
//! failure is surfaced to the caller.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, RetryError};

/// Configuration for the retrying caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub delay_ms: u64,
    /// Multiplier applied to the delay on every further retry (1.0 = fixed delay).
    pub backoff_multiplier: f64,
    /// Upper bound on a single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Case-insensitive substrings marking an error message as unrecoverable.
    pub fatal_signatures: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_ms: 5_000,
            backoff_multiplier: 1.0,
            max_delay_ms: 60_000,
            fatal_signatures: vec![
                "bad signature".into(),
                "unable to decode".into(),
                "createtype".into(),
            ],
        }
    }
}

/// Stateless retry policy — computes delays and classifies errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
    signatures: Vec<String>,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        let signatures = config
            .fatal_signatures
            .iter()
            .map(|s| s.to_lowercase())
            .collect();
        Self { config, signatures }
    }

    /// Total attempts allowed (never less than one).
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Delay before the next try after `attempt` (1-based) has failed, or
    /// `None` once the attempt budget is spent.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts() {
            return None;
        }
        let base_ms =
            self.config.delay_ms as f64 * self.config.backoff_multiplier.powi((attempt - 1) as i32);
        let capped = base_ms.min(self.config.max_delay_ms as f64);
        Some(Duration::from_millis(capped as u64))
    }

    /// Returns `true` if `err` must not be retried.
    pub fn is_fatal(&self, err: &ProviderError) -> bool {
        if err.is_fatal() {
            return true;
        }
        let message = err.to_string().to_lowercase();
        self.signatures.iter().any(|sig| message.contains(sig.as_str()))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// Wraps fallible async upstream calls with the [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct RetryingCaller {
    policy: RetryPolicy,
}

impl RetryingCaller {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            policy: RetryPolicy::new(config),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `f` until it succeeds, fails fatally, or the attempt budget is spent.
    ///
    /// `operation` names the call in logs and errors.
    pub async fn call<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match f().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation, attempt, "Upstream call recovered");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if self.policy.is_fatal(&err) {
                tracing::error!(
                    operation,
                    attempt,
                    error = %err,
                    "Unrecoverable upstream error, not retrying"
                );
                return Err(RetryError::Unrecoverable {
                    operation: operation.to_string(),
                    attempts: attempt,
                    source: err,
                });
            }

            match self.policy.next_delay(attempt) {
                Some(delay) => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Upstream call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::error!(
                        operation,
                        attempts = attempt,
                        error = %err,
                        "Retries exhausted"
                    );
                    return Err(RetryError::ExhaustedRetries {
                        operation: operation.to_string(),
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(max_attempts: u32) -> RetryingCaller {
        RetryingCaller::new(RetryConfig {
            max_attempts,
            delay_ms: 1,
            ..Default::default()
        })
    }

    #[test]
    fn fixed_delay_by_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(5_000)));
        assert_eq!(policy.next_delay(4), Some(Duration::from_millis(5_000)));
        assert!(policy.next_delay(5).is_none());
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 10,
            delay_ms: 100,
            backoff_multiplier: 10.0,
            max_delay_ms: 500,
            ..Default::default()
        });
        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_millis(500)));
        assert_eq!(policy.next_delay(6), Some(Duration::from_millis(500)));
    }

    #[test]
    fn fatal_classification() {
        let policy = RetryPolicy::default();
        assert!(policy.is_fatal(&ProviderError::Fatal("anything".into())));
        assert!(policy.is_fatal(&ProviderError::Rpc("Bad Signature in extrinsic".into())));
        assert!(policy.is_fatal(&ProviderError::Decode("Unable to decode storage".into())));
        assert!(!policy.is_fatal(&ProviderError::Connection("socket hang up".into())));
    }

    #[tokio::test]
    async fn transient_failure_uses_every_attempt() {
        let caller = fast(5);
        let mut calls = 0u32;
        let res: Result<(), _> = caller
            .call("era_points", || {
                calls += 1;
                async { Err(ProviderError::Connection("disconnected".into())) }
            })
            .await;
        assert_eq!(calls, 5);
        assert_eq!(caller.policy().max_attempts(), 5);
        match res {
            Err(err @ RetryError::ExhaustedRetries { .. }) => assert_eq!(err.attempts(), 5),
            other => panic!("expected exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fatal_failure_is_attempted_once() {
        let caller = fast(5);
        let mut calls = 0u32;
        let res: Result<(), _> = caller
            .call("exposure", || {
                calls += 1;
                async { Err(ProviderError::Decode("bad signature".into())) }
            })
            .await;
        assert_eq!(calls, 1);
        let err = res.unwrap_err();
        assert_eq!(err.attempts(), 1);
        assert!(matches!(err, RetryError::Unrecoverable { .. }));
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let caller = fast(5);
        let mut calls = 0u32;
        let value = caller
            .call("active_era", || {
                calls += 1;
                let n = calls;
                async move {
                    if n < 3 {
                        Err(ProviderError::Connection("reset".into()))
                    } else {
                        Ok(42u32)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls, 3);
    }
}
