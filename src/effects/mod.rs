//! Effects-as-data for collaborator operations.
//!
//! This module defines effect types that describe operations without executing them.
//! This enables:
//! - Pure reconciliation logic that decides which effects to issue
//! - Testability via fake backends
//! - Dry runs that perform reads and only log writes

pub mod dry_run;
pub mod github;
pub mod interpreter;

pub use dry_run::DryRunInterpreter;
pub use github::{
    CollaboratorData, GitHubEffect, GitHubResponse, Permission, RepoMembersData,
};
pub use interpreter::GitHubInterpreter;
