//! Octocrab client wrapper scoped to a specific repository.
//!
//! This module provides `OctocrabClient`, which wraps an `Octocrab` instance
//! and scopes all operations to a specific repository. Collaborator effects
//! carry no repository, so one client serves exactly one reconciliation target.

use octocrab::Octocrab;

use super::retry::{RetryConfig, RetryPolicy};
use crate::types::RepoId;

/// A GitHub API client scoped to a specific repository.
///
/// Cloning is cheap: the underlying `Octocrab` shares its HTTP connection pool,
/// so the binary builds one authenticated `Octocrab` and scopes a clone of it
/// to each configured repository.
#[derive(Clone)]
pub struct OctocrabClient {
    /// The underlying octocrab client.
    client: Octocrab,

    /// The repository this client is scoped to.
    repo: RepoId,

    retry_config: RetryConfig,
    retry_policy: RetryPolicy,
}

impl OctocrabClient {
    /// Creates a new client scoped to the given repository, retrying transient
    /// failures with [`RetryConfig::DEFAULT`].
    pub fn new(client: Octocrab, repo: RepoId) -> Self {
        Self {
            client,
            repo,
            retry_config: RetryConfig::DEFAULT,
            retry_policy: RetryPolicy::RetryTransient,
        }
    }

    /// Replaces the retry behaviour for every effect executed by this client.
    pub fn with_retry(mut self, config: RetryConfig, policy: RetryPolicy) -> Self {
        self.retry_config = config;
        self.retry_policy = policy;
        self
    }

    /// Returns a reference to the underlying octocrab client.
    pub fn inner(&self) -> &Octocrab {
        &self.client
    }

    /// Returns the repository this client is scoped to.
    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    /// Returns the repository owner.
    pub fn owner(&self) -> &str {
        &self.repo.owner
    }

    /// Returns the repository name.
    pub fn repo_name(&self) -> &str {
        &self.repo.repo
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry_config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }
}

impl std::fmt::Debug for OctocrabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctocrabClient")
            .field("repo", &self.repo)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}
