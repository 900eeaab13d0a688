//! Desired-state configuration.
//!
//! The configuration file lists, per repository, the logins that should have
//! access and the subset of them that should be admins:
//!
//! ```json
//! {
//!   "repos": [
//!     {"org": "acme", "name": "widgets", "members": ["Alice", "bob"], "admins": ["alice"]}
//!   ]
//! }
//! ```
//!
//! A repository that was renamed after the config was written keeps its
//! original `name` and sets `renamed_to`; reconciliation then targets the new
//! name.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reconcile::DesiredState;
use crate::types::RepoId;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading the file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config lists no repositories")]
    NoRepos,

    /// A repository entry has an empty `org` or `name`.
    #[error("repository entry {index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },

    #[error("invalid login {login:?} in {repo}")]
    InvalidLogin { repo: RepoId, login: String },

    /// Two entries resolve to the same target repository.
    #[error("repository {repo} is configured more than once")]
    DuplicateRepo { repo: RepoId },
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub repos: Vec<RepoConfig>,
}

/// Desired membership for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    pub org: String,
    pub name: String,

    /// Current name of the repository, if it was renamed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renamed_to: Option<String>,

    #[serde(default)]
    pub members: Vec<String>,

    /// Must be a subset of `members` to have any effect.
    #[serde(default)]
    pub admins: Vec<String>,
}

impl RepoConfig {
    /// The repository reconciliation should act on.
    pub fn target_repo(&self) -> RepoId {
        let name = self.renamed_to.as_deref().unwrap_or(&self.name);
        RepoId::new(&self.org, name)
    }

    pub fn desired_state(&self) -> DesiredState {
        DesiredState::new(self.target_repo(), &self.members, &self.admins)
    }
}

impl SyncConfig {
    /// Reads, parses and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let config: SyncConfig = serde_json::from_slice(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SyncConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks structural validity.
    ///
    /// Admins that are not members are legal but never promoted, so they only
    /// produce a warning.
    pub fn validate(&self) -> Result<()> {
        if self.repos.is_empty() {
            return Err(ConfigError::NoRepos);
        }

        let mut seen = HashSet::new();
        for (index, entry) in self.repos.iter().enumerate() {
            if entry.org.trim().is_empty() {
                return Err(ConfigError::EmptyField {
                    index,
                    field: "org",
                });
            }
            if entry.name.trim().is_empty() {
                return Err(ConfigError::EmptyField {
                    index,
                    field: "name",
                });
            }
            if let Some(renamed) = &entry.renamed_to
                && renamed.trim().is_empty()
            {
                return Err(ConfigError::EmptyField {
                    index,
                    field: "renamed_to",
                });
            }

            let repo = entry.target_repo();
            for login in entry.members.iter().chain(&entry.admins) {
                if !is_valid_login(login) {
                    return Err(ConfigError::InvalidLogin {
                        repo,
                        login: login.clone(),
                    });
                }
            }

            let key = repo.to_string().to_lowercase();
            if !seen.insert(key) {
                return Err(ConfigError::DuplicateRepo { repo });
            }

            let ungated = entry.desired_state().ungated_admins();
            if !ungated.is_empty() {
                let logins: Vec<&str> = ungated.iter().map(|l| l.as_str()).collect();
                tracing::warn!(
                    %repo,
                    admins = ?logins,
                    "Admins not listed as members will never be promoted"
                );
            }
        }

        Ok(())
    }
}

fn is_valid_login(login: &str) -> bool {
    !login.is_empty() && !login.contains('/') && !login.chars().any(char::is_whitespace)
}
