//! Applies a membership plan against a permissions backend.
//!
//! One call to [`MembershipReconciler::reconcile`] runs these steps in order,
//! awaiting each API call before issuing the next:
//!
//! 1. Fetch owner and members with `GetRepo` unless the caller supplied a
//!    cached snapshot.
//! 2. Fetch the current admins with `ListCollaborators`.
//! 3. Compute the plan, exempting the owner if it is already known.
//! 4. Add, remove, promote.
//! 5. If demotions are pending and the owner is still unknown, fetch it.
//! 6. Demote.
//!
//! Failures in steps 1, 2 and 5 abort the call; only step 5 can follow
//! mutations. Failures in steps 4 and 6 are logged, recorded in the report, and
//! never abort the batch.
//!
//! With an unknown owner, removals are attempted for every unexpected member.
//! The backend refuses to remove the owner, so the owner lands in the result as
//! a failed removal.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use super::plan::{MembershipDiff, MembershipPlan};
use super::report::{OperationKind, OperationOutcome, ReconcileReport};
use super::state::{DesiredState, ObservedState};
use crate::effects::{
    CollaboratorData, GitHubEffect, GitHubInterpreter, GitHubResponse, Permission,
    RepoMembersData,
};
use crate::types::{Login, RepoId};

/// Errors that abort a reconciliation call.
///
/// Per-operation failures are not errors; they appear in [`ReconcileReport`].
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The initial owner and membership snapshot could not be fetched.
    #[error("failed to fetch repository {repo}: {message}")]
    FetchRepo { repo: RepoId, message: String },

    /// The collaborator listing with roles could not be fetched.
    #[error("failed to list collaborators of {repo}: {message}")]
    ListCollaborators { repo: RepoId, message: String },

    /// The owner was unknown, needed to exempt it from demotion, and could not
    /// be fetched. Additions, removals and promotions have already been issued.
    #[error("failed to resolve owner of {repo}: {message}")]
    ResolveOwner { repo: RepoId, message: String },

    /// The backend answered a query with the wrong response variant.
    #[error("unexpected response to {effect:?}: {response:?}")]
    UnexpectedResponse {
        effect: GitHubEffect,
        response: GitHubResponse,
    },
}

/// Result of a reconciliation call that did not abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// The resulting membership, sorted: retained members, successful additions,
    /// failed removals, and the owner if it was an observed member.
    ///
    /// Callers pass this back as the cached snapshot on the next cycle.
    pub members: Vec<Login>,

    /// The owner, if supplied, fetched, or resolved during the call.
    pub owner: Option<Login>,

    pub report: ReconcileReport,
}

/// Converges a repository's collaborators to a [`DesiredState`].
///
/// The reconciler holds no state between calls. Reconciling several
/// repositories concurrently requires one interpreter per repository, since
/// interpreters are repo-scoped.
pub struct MembershipReconciler<G> {
    github: G,
}

impl<G> MembershipReconciler<G>
where
    G: GitHubInterpreter,
    G::Error: fmt::Display,
{
    pub fn new(github: G) -> Self {
        MembershipReconciler { github }
    }

    /// Reconciles one repository.
    ///
    /// `observed_members` is the caller's cached snapshot from the previous
    /// cycle; `None` or an empty slice triggers a fresh fetch. `owner_hint` is
    /// the owner cached alongside it.
    #[instrument(skip_all, fields(repo = %desired.repo))]
    pub async fn reconcile(
        &self,
        desired: &DesiredState,
        observed_members: Option<&[Login]>,
        owner_hint: Option<Login>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let repo = &desired.repo;
        let mut observed = ObservedState::new(owner_hint);

        match observed_members {
            Some(cached) if !cached.is_empty() => {
                debug!(count = cached.len(), "Using cached membership snapshot");
                observed.members.extend(cached.iter().cloned());
            }
            _ => {
                let snapshot = self
                    .fetch_repo(|message| ReconcileError::FetchRepo {
                        repo: repo.clone(),
                        message,
                    })
                    .await?;
                for member in &snapshot.members {
                    observed.add_member(member);
                }
                observed.owner = Some(Login::new(&snapshot.owner));
            }
        }

        for collaborator in self.fetch_collaborators(repo).await? {
            if collaborator.is_admin {
                observed.add_admin(&collaborator.login);
            } else {
                observed.note_spelling(&collaborator.login);
            }
        }

        let mut plan = MembershipDiff::compute(desired, &observed).into_plan(observed.owner.as_ref());
        debug!(
            additions = plan.additions.len(),
            removals = plan.removals.len(),
            promotions = plan.promotions.len(),
            demotions = plan.demotions.len(),
            calls = plan.call_count(),
            "Computed membership plan"
        );

        let mut members = plan.retained.clone();
        let mut report = ReconcileReport::default();
        self.apply_membership(&plan, &observed, &mut members, &mut report)
            .await;

        if plan.demotions_await_owner(observed.owner.as_ref()) {
            let snapshot = self
                .fetch_repo(|message| ReconcileError::ResolveOwner {
                    repo: repo.clone(),
                    message,
                })
                .await?;
            let owner = Login::new(&snapshot.owner);
            plan.exempt_owner_from_demotions(&owner);
            observed.owner = Some(owner);
        }

        self.apply_demotions(&plan, &observed, &mut report).await;

        Ok(ReconcileOutcome {
            members: members.into_iter().collect(),
            owner: observed.owner,
            report,
        })
    }

    /// Executes additions, removals and promotions, once each.
    async fn apply_membership(
        &self,
        plan: &MembershipPlan,
        observed: &ObservedState,
        members: &mut BTreeSet<Login>,
        report: &mut ReconcileReport,
    ) {
        for login in &plan.additions {
            info!(%login, operation = "add", "Adding collaborator");
            match self.grant(login.as_str(), Permission::Push).await {
                Ok(()) => {
                    members.insert(login.clone());
                    report.record(login.clone(), OperationKind::Add, OperationOutcome::Applied);
                }
                Err(e) => {
                    // Dropped from the result; the next cycle sees it missing
                    // and tries again.
                    error!(%login, operation = "add", error = %e, "Failed to add collaborator");
                    report.record(
                        login.clone(),
                        OperationKind::Add,
                        OperationOutcome::Failed { error: e },
                    );
                }
            }
        }

        if let Some(owner) = &plan.owner_exempt_removal {
            debug!(login = %owner, "Not removing repository owner");
            members.insert(owner.clone());
            report.record(
                owner.clone(),
                OperationKind::Remove,
                OperationOutcome::SkippedOwner,
            );
        }

        for login in &plan.removals {
            info!(%login, operation = "remove", "Removing collaborator");
            match self.revoke(observed.api_login(login)).await {
                Ok(()) => {
                    report.record(login.clone(), OperationKind::Remove, OperationOutcome::Applied);
                }
                Err(e) => {
                    // Still a de-facto member; keep tracking it.
                    error!(%login, operation = "remove", error = %e, "Failed to remove collaborator");
                    members.insert(login.clone());
                    report.record(
                        login.clone(),
                        OperationKind::Remove,
                        OperationOutcome::Failed { error: e },
                    );
                }
            }
        }

        for login in &plan.promotions {
            info!(%login, operation = "promote", "Promoting developer to admin");
            let outcome = self
                .change_role(observed.api_login(login), Permission::Admin)
                .await;
            report.record(login.clone(), OperationKind::Promote, outcome);
        }
    }

    /// Executes demotions. The owner, if pending, must already be exempted.
    async fn apply_demotions(
        &self,
        plan: &MembershipPlan,
        observed: &ObservedState,
        report: &mut ReconcileReport,
    ) {
        if let Some(owner) = &plan.owner_exempt_demotion {
            debug!(login = %owner, "Not demoting repository owner");
            report.record(
                owner.clone(),
                OperationKind::Demote,
                OperationOutcome::SkippedOwner,
            );
        }

        for login in &plan.demotions {
            info!(%login, operation = "demote", "Demoting admin to developer");
            let outcome = self
                .change_role(observed.api_login(login), Permission::Push)
                .await;
            report.record(login.clone(), OperationKind::Demote, outcome);
        }
    }

    /// Revokes the current role, then grants `permission`.
    ///
    /// The grant is attempted even if the revoke failed. Nothing is rolled back:
    /// a later cycle re-detects any mismatch.
    async fn change_role(&self, login: &str, permission: Permission) -> OperationOutcome {
        let revoke_error = self.revoke(login).await.err();
        if let Some(e) = &revoke_error {
            error!(%login, error = %e, "Failed to revoke current role");
        }

        let grant_error = self.grant(login, permission).await.err();
        if let Some(e) = &grant_error {
            error!(
                %login,
                permission = permission.as_api_str(),
                error = %e,
                "Failed to grant new role"
            );
            if revoke_error.is_none() {
                warn!(%login, "Collaborator left without access until the next cycle");
            }
        }

        match (revoke_error, grant_error) {
            (None, None) => OperationOutcome::Applied,
            (revoke_error, grant_error) => OperationOutcome::RoleChangeFailed {
                revoke_error,
                grant_error,
            },
        }
    }

    // ─── Backend Calls ────────────────────────────────────────────────────────

    /// Fetches owner and members. `on_error` picks the variant, since the same
    /// query serves both the initial snapshot and owner resolution.
    async fn fetch_repo(
        &self,
        on_error: impl FnOnce(String) -> ReconcileError,
    ) -> Result<RepoMembersData, ReconcileError> {
        let effect = GitHubEffect::GetRepo;
        match self.github.interpret(effect.clone()).await {
            Ok(GitHubResponse::RepoMembers(data)) => Ok(data),
            Ok(response) => Err(ReconcileError::UnexpectedResponse { effect, response }),
            Err(e) => {
                let err = on_error(e.to_string());
                error!(error = %err, "Aborting reconciliation");
                Err(err)
            }
        }
    }

    async fn fetch_collaborators(
        &self,
        repo: &RepoId,
    ) -> Result<Vec<CollaboratorData>, ReconcileError> {
        let effect = GitHubEffect::ListCollaborators;
        match self.github.interpret(effect.clone()).await {
            Ok(GitHubResponse::Collaborators(data)) => Ok(data),
            Ok(response) => Err(ReconcileError::UnexpectedResponse { effect, response }),
            Err(e) => {
                let err = ReconcileError::ListCollaborators {
                    repo: repo.clone(),
                    message: e.to_string(),
                };
                error!(error = %err, "Aborting reconciliation");
                Err(err)
            }
        }
    }

    async fn grant(&self, login: &str, permission: Permission) -> Result<(), String> {
        let effect = GitHubEffect::AddCollaborator {
            login: login.to_string(),
            permission,
        };
        match self.github.interpret(effect).await {
            Ok(GitHubResponse::CollaboratorAdded) => Ok(()),
            Ok(other) => Err(format!("unexpected response: {:?}", other)),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn revoke(&self, login: &str) -> Result<(), String> {
        let effect = GitHubEffect::RemoveCollaborator {
            login: login.to_string(),
        };
        match self.github.interpret(effect).await {
            Ok(GitHubResponse::CollaboratorRemoved) => Ok(()),
            Ok(other) => Err(format!("unexpected response: {:?}", other)),
            Err(e) => Err(e.to_string()),
        }
    }
}
