//! Dry-run interpreter.
//!
//! Wraps another interpreter, forwarding queries so that plans are computed
//! against real state, while answering every mutation with a synthetic success.

use std::future::Future;

use tracing::info;

use super::github::{GitHubEffect, GitHubResponse};
use super::interpreter::GitHubInterpreter;

/// A GitHub interpreter that reads through to `G` but never mutates.
///
/// # Responses
///
/// - `GetRepo`, `ListCollaborators`: whatever the inner interpreter returns
/// - `AddCollaborator`: `CollaboratorAdded`, logged at info level
/// - `RemoveCollaborator`: `CollaboratorRemoved`, logged at info level
#[derive(Debug, Clone)]
pub struct DryRunInterpreter<G> {
    inner: G,
}

impl<G> DryRunInterpreter<G> {
    pub fn new(inner: G) -> Self {
        DryRunInterpreter { inner }
    }
}

impl<G> GitHubInterpreter for DryRunInterpreter<G>
where
    G: GitHubInterpreter + Sync,
{
    type Error = G::Error;

    fn interpret(
        &self,
        effect: GitHubEffect,
    ) -> impl Future<Output = Result<GitHubResponse, Self::Error>> + Send {
        async move {
            match effect {
                GitHubEffect::AddCollaborator { login, permission } => {
                    info!(
                        %login,
                        permission = permission.as_api_str(),
                        "Dry run: would add collaborator"
                    );
                    Ok(GitHubResponse::CollaboratorAdded)
                }
                GitHubEffect::RemoveCollaborator { login } => {
                    info!(%login, "Dry run: would remove collaborator");
                    Ok(GitHubResponse::CollaboratorRemoved)
                }
                query => self.inner.interpret(query).await,
            }
        }
    }
}
