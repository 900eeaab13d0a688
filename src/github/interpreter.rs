//! GitHub effect interpreter using octocrab.
//!
//! This module implements the `GitHubInterpreter` trait, executing collaborator
//! effects against the real GitHub API via octocrab.
//!
//! Key implementation details:
//! - Only direct collaborators are listed (`affiliation=direct`). Org members
//!   with base-permission access and org owners are outside the reconciler's
//!   reach, so they must not show up as removal or demotion candidates.
//! - Granting access to someone who is not yet a collaborator creates a pending
//!   invitation (HTTP 201). Pending invitees are reported as collaborators with
//!   their invited role, and revoking cancels the invitation, so an invitee is
//!   neither re-added nor re-promoted while the invitation is open.
//! - Grant and revoke go through octocrab's raw `_put`/`_delete` because the
//!   endpoints answer with either an invitation body or no body at all
//! - Retry logic with exponential backoff for transient errors

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::effects::{
    CollaboratorData, GitHubEffect, GitHubInterpreter, GitHubResponse, Permission,
    RepoMembersData,
};
use crate::types::RepoId;

use super::client::OctocrabClient;
use super::error::GitHubApiError;
use super::retry::{RetryConfig, RetryPolicy, retry_with_backoff};

const PAGE_SIZE: usize = 100;

// ─── Interpreter Implementation ───────────────────────────────────────────────

impl GitHubInterpreter for OctocrabClient {
    type Error = GitHubApiError;

    async fn interpret(&self, effect: GitHubEffect) -> Result<GitHubResponse, Self::Error> {
        interpret_github_effect(self, effect, self.retry_config(), self.retry_policy()).await
    }
}

/// Interprets a GitHub effect, executing it against the GitHub API.
///
/// This is the main entry point for effect interpretation. It handles retry
/// logic and proper error categorization.
///
/// # Arguments
///
/// * `client` - The octocrab client scoped to a repository
/// * `effect` - The effect to execute
/// * `retry_config` - Backoff schedule for transient errors
/// * `retry_policy` - Whether to retry transient errors
pub async fn interpret_github_effect(
    client: &OctocrabClient,
    effect: GitHubEffect,
    retry_config: RetryConfig,
    retry_policy: RetryPolicy,
) -> Result<GitHubResponse, GitHubApiError> {
    retry_with_backoff(retry_config, retry_policy, || {
        execute_effect(client, effect.clone())
    })
    .await
}

/// Executes a single effect without retry logic.
async fn execute_effect(
    client: &OctocrabClient,
    effect: GitHubEffect,
) -> Result<GitHubResponse, GitHubApiError> {
    match effect {
        GitHubEffect::GetRepo => get_repo(client).await,
        GitHubEffect::ListCollaborators => {
            let collaborators = list_collaborators(client).await?;
            Ok(GitHubResponse::Collaborators(collaborators))
        }
        GitHubEffect::AddCollaborator { login, permission } => {
            add_collaborator(client, &login, permission).await
        }
        GitHubEffect::RemoveCollaborator { login } => remove_collaborator(client, &login).await,
    }
}

// ─── Wire Types ───────────────────────────────────────────────────────────────

/// An entry of `GET /repos/{owner}/{repo}/collaborators`.
#[derive(Debug, Deserialize)]
struct RawCollaborator {
    login: String,
    #[serde(default)]
    permissions: Option<RawPermissions>,
}

#[derive(Debug, Deserialize)]
struct RawPermissions {
    #[serde(default)]
    admin: bool,
}

impl From<RawCollaborator> for CollaboratorData {
    fn from(raw: RawCollaborator) -> Self {
        CollaboratorData {
            is_admin: raw.permissions.is_some_and(|p| p.admin),
            login: raw.login,
        }
    }
}

/// An entry of `GET /repos/{owner}/{repo}/invitations`.
#[derive(Debug, Deserialize)]
struct RawInvitation {
    id: u64,
    /// Absent for invitations sent to an email address.
    #[serde(default)]
    invitee: Option<RawAccount>,
    /// `read`, `triage`, `write`, `maintain` or `admin`.
    permissions: String,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    login: String,
}

impl RawInvitation {
    fn invitee_login(&self) -> Option<&str> {
        self.invitee.as_ref().map(|a| a.login.as_str())
    }
}

#[derive(Serialize)]
struct ListParams {
    per_page: usize,
    page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    affiliation: Option<&'static str>,
}

// ─── Queries ──────────────────────────────────────────────────────────────────

async fn get_repo(client: &OctocrabClient) -> Result<GitHubResponse, GitHubApiError> {
    let repo = client
        .inner()
        .repos(client.owner(), client.repo_name())
        .get()
        .await
        .map_err(GitHubApiError::from_octocrab)?;

    let owner = repo.owner.map(|author| author.login).ok_or_else(|| {
        GitHubApiError::permanent_without_source(format!(
            "Repository {} has no owner in the API response",
            client.repo()
        ))
    })?;

    let members = list_collaborators(client)
        .await?
        .into_iter()
        .map(|c| c.login)
        .collect();

    Ok(GitHubResponse::RepoMembers(RepoMembersData { owner, members }))
}

/// Fetches every page of a list endpoint.
async fn get_all_pages<T: DeserializeOwned>(
    client: &OctocrabClient,
    route: &str,
    affiliation: Option<&'static str>,
) -> Result<Vec<T>, GitHubApiError> {
    let mut page = 1u32;
    let mut all_items = Vec::new();

    loop {
        let params = ListParams {
            per_page: PAGE_SIZE,
            page,
            affiliation,
        };
        let items: Vec<T> = client
            .inner()
            .get(route, Some(&params))
            .await
            .map_err(GitHubApiError::from_octocrab)?;

        let is_last_page = items.len() < PAGE_SIZE;
        all_items.extend(items);

        if is_last_page {
            break;
        }
        page += 1;
    }

    Ok(all_items)
}

async fn list_invitations(client: &OctocrabClient) -> Result<Vec<RawInvitation>, GitHubApiError> {
    get_all_pages(client, &invitations_path(client.repo()), None).await
}

/// Direct collaborators followed by pending invitees.
async fn list_collaborators(
    client: &OctocrabClient,
) -> Result<Vec<CollaboratorData>, GitHubApiError> {
    let collaborators: Vec<RawCollaborator> =
        get_all_pages(client, &collaborators_path(client.repo()), Some("direct")).await?;
    let invitations = list_invitations(client).await?;

    let merged = merge_invitations(
        collaborators.into_iter().map(CollaboratorData::from).collect(),
        &invitations,
    );
    tracing::debug!(
        repo = %client.repo(),
        count = merged.len(),
        pending = invitations.len(),
        "Listed collaborators"
    );
    Ok(merged)
}

/// Appends pending invitees that are not already collaborators.
fn merge_invitations(
    mut collaborators: Vec<CollaboratorData>,
    invitations: &[RawInvitation],
) -> Vec<CollaboratorData> {
    for invitation in invitations {
        let Some(login) = invitation.invitee_login() else {
            continue;
        };
        if collaborators
            .iter()
            .any(|c| c.login.eq_ignore_ascii_case(login))
        {
            continue;
        }
        collaborators.push(CollaboratorData {
            login: login.to_string(),
            is_admin: invitation.permissions == "admin",
        });
    }
    collaborators
}

// ─── Mutations ────────────────────────────────────────────────────────────────

async fn add_collaborator(
    client: &OctocrabClient,
    login: &str,
    permission: Permission,
) -> Result<GitHubResponse, GitHubApiError> {
    #[derive(Serialize)]
    struct AddRequest {
        permission: &'static str,
    }

    let request = AddRequest {
        permission: permission.as_api_str(),
    };

    // 201 carries a new or updated invitation, 204 means the user already had
    // access and the permission was updated in place.
    let response = client
        .inner()
        ._put(collaborator_path(client.repo(), login), Some(&request))
        .await
        .map_err(GitHubApiError::from_octocrab)?;
    let response = octocrab::map_github_error(response)
        .await
        .map_err(GitHubApiError::from_octocrab)?;

    if response.status().as_u16() == 201 {
        tracing::info!(%login, permission = permission.as_api_str(), "Invitation pending");
    }
    Ok(GitHubResponse::CollaboratorAdded)
}

/// Revokes access. A pending invitee has no access yet, so their invitation
/// is cancelled instead.
async fn remove_collaborator(
    client: &OctocrabClient,
    login: &str,
) -> Result<GitHubResponse, GitHubApiError> {
    let invitations = list_invitations(client).await?;
    let pending = invitation_ids_for(&invitations, login);

    if pending.is_empty() {
        delete(client, collaborator_path(client.repo(), login)).await?;
    } else {
        for id in pending {
            delete(client, invitation_path(client.repo(), id)).await?;
        }
        tracing::info!(%login, "Cancelled pending invitation");
    }

    Ok(GitHubResponse::CollaboratorRemoved)
}

async fn delete(client: &OctocrabClient, path: String) -> Result<(), GitHubApiError> {
    let response = client
        .inner()
        ._delete(path, None::<&()>)
        .await
        .map_err(GitHubApiError::from_octocrab)?;
    octocrab::map_github_error(response)
        .await
        .map_err(GitHubApiError::from_octocrab)?;
    Ok(())
}

fn invitation_ids_for(invitations: &[RawInvitation], login: &str) -> Vec<u64> {
    invitations
        .iter()
        .filter(|i| i.invitee_login().is_some_and(|l| l.eq_ignore_ascii_case(login)))
        .map(|i| i.id)
        .collect()
}

// ─── Paths ────────────────────────────────────────────────────────────────────

fn collaborators_path(repo: &RepoId) -> String {
    format!("/repos/{}/{}/collaborators", repo.owner, repo.repo)
}

/// Path for a single collaborator. The login is percent-encoded since it comes
/// from user config and may contain characters GitHub would reject anyway.
fn collaborator_path(repo: &RepoId, login: &str) -> String {
    format!(
        "{}/{}",
        collaborators_path(repo),
        urlencoding::encode(login)
    )
}

fn invitations_path(repo: &RepoId) -> String {
    format!("/repos/{}/{}/invitations", repo.owner, repo.repo)
}

fn invitation_path(repo: &RepoId, id: u64) -> String {
    format!("{}/{}", invitations_path(repo), id)
}
