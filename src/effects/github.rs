//! GitHub API effect types.
//!
//! These types describe collaborator operations as data, without executing them.
//! An interpreter executes them against the actual GitHub API, a fake backend, or
//! nothing at all (dry-run).

use serde::{Deserialize, Serialize};

/// The permission level granted to a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Developer access: read and write.
    Push,
    /// Full administrative access.
    Admin,
}

impl Permission {
    /// Returns the GitHub API permission string for this level.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Permission::Push => "push",
            Permission::Admin => "admin",
        }
    }
}

/// A GitHub API effect.
///
/// Effects are repo-scoped: the interpreter is constructed with a `RepoId`, so
/// effects don't include it. Logins are carried as plain strings because they
/// are passed back to the API verbatim, in whatever case the caller chose.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GitHubEffect {
    // ─── Queries ──────────────────────────────────────────────────────────────
    /// Fetch the repository owner together with its full collaborator list.
    GetRepo,

    /// List collaborators with their admin flag.
    ///
    /// Only accounts this crate can manage count: direct collaborators and
    /// pending invitees, the latter with the role they were invited with.
    ListCollaborators,

    // ─── Mutations ────────────────────────────────────────────────────────────
    /// Grant `permission` to `login`.
    ///
    /// Idempotent: granting to an existing collaborator succeeds and updates
    /// nothing when the permission is unchanged.
    AddCollaborator {
        login: String,
        permission: Permission,
    },

    /// Revoke all access for `login`, or cancel its pending invitation.
    RemoveCollaborator { login: String },
}

impl GitHubEffect {
    /// Returns true if this effect changes state on the backend.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            GitHubEffect::AddCollaborator { .. } | GitHubEffect::RemoveCollaborator { .. }
        )
    }
}

// ─── Response Types ───────────────────────────────────────────────────────────

/// A collaborator as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorData {
    /// The login, in the case the backend reported it.
    pub login: String,
    /// Whether the collaborator holds admin permission.
    pub is_admin: bool,
}

/// Repository owner and membership snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMembersData {
    /// Login of the repository owner, who can never be removed.
    pub owner: String,
    /// Logins of every collaborator regardless of role.
    pub members: Vec<String>,
}

/// Response from a GitHub effect.
///
/// Each variant corresponds to the response from a particular effect type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GitHubResponse {
    /// Response to `GetRepo`.
    RepoMembers(RepoMembersData),

    /// Response to `ListCollaborators`.
    Collaborators(Vec<CollaboratorData>),

    /// Response to `AddCollaborator`.
    CollaboratorAdded,

    /// Response to `RemoveCollaborator`.
    CollaboratorRemoved,
}
