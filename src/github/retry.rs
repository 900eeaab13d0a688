//! Exponential backoff for transient GitHub API errors.
//!
//! Every effect the interpreter executes goes through [`retry_with_backoff`].
//! Collaborator grants and revokes are safe to repeat: granting a permission
//! the login already holds, or revoking an absent login, changes nothing.

use std::future::Future;
use std::time::Duration;

use super::error::GitHubApiError;

/// Backoff schedule. The delay doubles after every attempt, up to `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryConfig {
    /// Single-shot runs: 2s, 4s, 8s.
    pub const DEFAULT: Self = Self {
        max_retries: 3,
        initial_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(8),
    };

    /// Interval mode, where sitting out a short outage beats skipping a cycle:
    /// 2s, 4s, 8s, 16s, 32s, 60s.
    pub const DAEMON: Self = Self {
        max_retries: 6,
        initial_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(60),
    };

    /// Delay before retry number `retry` (0-indexed).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Whether transient errors are retried at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetryPolicy {
    #[default]
    RetryTransient,

    /// Return the first error; set by `--no-retry`.
    NoRetry,
}

/// Runs `operation`, retrying transient failures according to `config`.
///
/// Permanent errors, and the last transient error once retries run out, are
/// returned to the caller unchanged.
pub async fn retry_with_backoff<T, F, Fut>(
    config: RetryConfig,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, GitHubApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GitHubApiError>>,
{
    let retries = match policy {
        RetryPolicy::RetryTransient => config.max_retries,
        RetryPolicy::NoRetry => 0,
    };

    let mut retry = 0;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.kind.is_retriable() {
            return Err(err);
        }
        if retry >= retries {
            if retries > 0 {
                tracing::warn!(error = %err, retries, "Giving up after repeated transient errors");
            }
            return Err(err);
        }

        let delay = config.delay_for_retry(retry);
        tracing::warn!(
            error = %err,
            retry = retry + 1,
            delay_ms = delay.as_millis() as u64,
            "Transient GitHub API error, retrying"
        );
        tokio::time::sleep(delay).await;
        retry += 1;
    }
}
