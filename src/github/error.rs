//! Categorised GitHub API errors.
//!
//! Retry decisions hinge on one question: would sending the same request again
//! plausibly succeed? Server errors, rate limits and network failures are
//! [`GitHubErrorKind::Transient`]; everything else (unknown user, missing
//! token scope, refusing to remove the owner) is [`GitHubErrorKind::Permanent`].

use std::fmt;
use thiserror::Error;

/// Retry category of a GitHub API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHubErrorKind {
    /// 5xx, 429, rate-limit 403s, timeouts and connection failures.
    Transient,
    /// Any other failure.
    Permanent,
}

impl GitHubErrorKind {
    pub fn is_retriable(&self) -> bool {
        matches!(self, GitHubErrorKind::Transient)
    }

    fn classify(status_code: Option<u16>, message: &str) -> Self {
        match status_code {
            Some(429) | Some(500..=599) => GitHubErrorKind::Transient,
            Some(403) if is_rate_limit_message(message) => GitHubErrorKind::Transient,
            Some(_) => GitHubErrorKind::Permanent,
            None if is_network_message(message) => GitHubErrorKind::Transient,
            None => GitHubErrorKind::Permanent,
        }
    }
}

/// A GitHub API error with its retry category.
#[derive(Debug, Error)]
pub struct GitHubApiError {
    pub kind: GitHubErrorKind,

    /// HTTP status, when GitHub answered at all.
    pub status_code: Option<u16>,

    pub message: String,

    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for GitHubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "GitHub API error (HTTP {}): {}", code, self.message),
            None => write!(f, "GitHub API error: {}", self.message),
        }
    }
}

impl GitHubApiError {
    /// Categorises an octocrab error.
    ///
    /// Only `octocrab::Error::GitHub` carries a status code; every other
    /// variant failed before GitHub produced a response, so it is judged by
    /// its message alone.
    pub fn from_octocrab(err: octocrab::Error) -> Self {
        let (status_code, message) = match &err {
            octocrab::Error::GitHub { source, .. } => {
                (Some(source.status_code.as_u16()), source.message.clone())
            }
            other => (None, other.to_string()),
        };

        Self {
            kind: GitHubErrorKind::classify(status_code, &message),
            status_code,
            message,
            source: Some(err),
        }
    }

    /// A permanent error that did not come from octocrab, such as a malformed
    /// response.
    pub fn permanent_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: GitHubErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn transient_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: GitHubErrorKind::Transient,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }
}

/// GitHub signals primary and secondary rate limits with a 403 whose message
/// mentions the limit.
fn is_rate_limit_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("rate limit") || message.contains("abuse detection")
}

fn is_network_message(message: &str) -> bool {
    let message = message.to_lowercase();
    ["timed out", "timeout", "connection", "dns error"]
        .iter()
        .any(|marker| message.contains(marker))
}
