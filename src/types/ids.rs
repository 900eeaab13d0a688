//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of repository names and account logins,
//! and keep the case-folding rule for logins in exactly one place.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A repository identifier (owner/repo format).
///
/// `owner` is the owning organisation or user as it appears in API paths. It is
/// not necessarily the account GitHub reports as the repository owner login.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        RepoId {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Parses `owner/repo`, also accepting a `https://github.com/` prefix.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s
            .strip_prefix("https://github.com/")
            .or_else(|| s.strip_prefix("github.com/"))
            .unwrap_or(s);
        let (owner, repo) = s.split_once('/')?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }
        Some(RepoId::new(owner, repo))
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// An account login, normalised to lower case.
///
/// GitHub logins are case-insensitive, so every login entering the reconciler is
/// folded on construction. Equality, hashing and ordering all operate on the
/// folded form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Login(String);

impl Login {
    pub fn new(login: impl AsRef<str>) -> Self {
        Login(login.as_ref().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `other` names the same account, ignoring case.
    pub fn matches(&self, other: &str) -> bool {
        self.0 == other.to_lowercase()
    }
}

impl fmt::Display for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Login {
    fn from(s: String) -> Self {
        Login::new(s)
    }
}

impl From<&str> for Login {
    fn from(s: &str) -> Self {
        Login::new(s)
    }
}

impl From<Login> for String {
    fn from(login: Login) -> Self {
        login.0
    }
}
