//! Retry-with-backoff for network-bound operations
//!
//! The wait between attempts is chosen from a table of HTTP status codes: the
//! first code whose digits appear in the error message selects its wait,
//! otherwise the default wait applies. Sleeping goes through the [`Sleeper`]
//! trait so the waits can be observed in tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt count and wait table for [`retry_with_backoff`]
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub default_wait: Duration,
    pub status_waits: BTreeMap<u16, Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        let mut status_waits = BTreeMap::new();
        status_waits.insert(429, Duration::from_secs(60));
        status_waits.insert(503, Duration::from_secs(60));
        Self {
            max_attempts: 3,
            default_wait: Duration::from_secs(5),
            status_waits,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes a single attempt
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            default_wait: Duration::ZERO,
            status_waits: BTreeMap::new(),
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_default_wait(mut self, wait: Duration) -> Self {
        self.default_wait = wait;
        self
    }

    pub fn with_status_wait(mut self, status: u16, wait: Duration) -> Self {
        self.status_waits.insert(status, wait);
        self
    }

    /// Wait to apply after a failure described by `message`
    pub fn wait_for(&self, message: &str) -> Duration {
        self.status_waits
            .iter()
            .find(|(status, _)| message.contains(&status.to_string()))
            .map(|(_, wait)| *wait)
            .unwrap_or(self.default_wait)
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested sleeps instead of waiting
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
    }
}

/// Run `op` until it succeeds, `should_retry` rejects the error, or the
/// policy's attempts are used up. The last error is returned unchanged.
///
/// `op` receives the 1-based attempt number.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    label: &str,
    should_retry: P,
    mut op: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", label, attempt);
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt >= max_attempts || !should_retry(&err) {
                    return Err(err);
                }

                let message = err.to_string();
                let wait = policy.wait_for(&message);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    label, attempt, max_attempts, message, wait
                );
                sleeper.sleep(wait).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    #[test]
    fn test_wait_for_prefers_matching_status() {
        let policy = RetryPolicy::none()
            .with_default_wait(Duration::from_secs(5))
            .with_status_wait(503, Duration::from_secs(60));

        assert_eq!(policy.wait_for("HTTP 503 from host"), Duration::from_secs(60));
        assert_eq!(policy.wait_for("connection reset"), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_status_wait_used_between_every_attempt() {
        let policy = RetryPolicy::none()
            .with_max_attempts(4)
            .with_default_wait(Duration::from_secs(5))
            .with_status_wait(503, Duration::from_secs(60));
        let sleeper = RecordingSleeper::new();
        let mut calls = 0;

        let result: Result<(), PipelineError> =
            retry_with_backoff(&policy, &sleeper, "fetch", |_| true, |_| {
                calls += 1;
                async { Err(PipelineError::http_status(503, "https://example.com")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls, 4);
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(60); 3]);
    }

    #[tokio::test]
    async fn test_default_wait_when_no_status_matches() {
        let policy = RetryPolicy::none()
            .with_max_attempts(2)
            .with_default_wait(Duration::from_secs(7))
            .with_status_wait(503, Duration::from_secs(60));
        let sleeper = RecordingSleeper::new();

        let result: Result<(), String> = retry_with_backoff(
            &policy,
            &sleeper,
            "fetch",
            |_| true,
            |_| async { Err("connection refused".to_string()) },
        )
        .await;

        assert_eq!(result.unwrap_err(), "connection refused");
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(7)]);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failure() {
        let policy = RetryPolicy::default();
        let sleeper = RecordingSleeper::new();

        let result: Result<u32, String> =
            retry_with_backoff(&policy, &sleeper, "report", |_| true, |attempt| async move {
                if attempt < 2 {
                    Err("HTTP 429".to_string())
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(60)]);
    }

    #[tokio::test]
    async fn test_non_retryable_error_returns_immediately() {
        let policy = RetryPolicy::default().with_max_attempts(5);
        let sleeper = RecordingSleeper::new();
        let mut calls = 0;

        let result: Result<(), PipelineError> = retry_with_backoff(
            &policy,
            &sleeper,
            "login",
            PipelineError::is_transient,
            |_| {
                calls += 1;
                async { Err(PipelineError::authentication("bad token")) }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
        assert!(sleeper.sleeps().is_empty());
    }
}
