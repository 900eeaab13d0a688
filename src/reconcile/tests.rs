//! Scenario and property tests for reconciliation against a fake backend.
//!
//! Unit tests for the pure plan live in `plan.rs`; engine internals are
//! covered in `engine.rs`.

use std::collections::BTreeSet;

use proptest::prelude::*;

use super::*;
use crate::effects::{DryRunInterpreter, GitHubEffect, Permission};
use crate::test_utils::{FakeBackend, arb_login, arb_login_set};
use crate::types::{Login, RepoId};

// ─── Test Helpers ───

fn desired(members: &[&str], admins: &[&str]) -> DesiredState {
    DesiredState::new(RepoId::new("acme", "widgets"), members.iter(), admins.iter())
}

fn logins(names: &[&str]) -> Vec<Login> {
    names.iter().map(Login::new).collect()
}

fn add(login: &str, permission: Permission) -> GitHubEffect {
    GitHubEffect::AddCollaborator {
        login: login.to_string(),
        permission,
    }
}

fn remove(login: &str) -> GitHubEffect {
    GitHubEffect::RemoveCollaborator {
        login: login.to_string(),
    }
}

// ─── Scenarios ───

#[tokio::test]
async fn add_remove_and_promote() {
    let backend = FakeBackend::new("a").with_member("a").with_member("c");
    let reconciler = MembershipReconciler::new(&backend);

    let outcome = reconciler
        .reconcile(&desired(&["a", "b"], &["b"]), None, None)
        .await
        .unwrap();

    assert_eq!(
        backend.mutations(),
        vec![
            add("b", Permission::Push),
            remove("c"),
            remove("b"),
            add("b", Permission::Admin),
        ]
    );
    assert_eq!(outcome.members, logins(&["a", "b"]));
    assert_eq!(outcome.owner, Some(Login::new("a")));
    assert_eq!(backend.members(), logins(&["a", "b"]).into_iter().collect::<BTreeSet<_>>());
    assert_eq!(backend.admins(), BTreeSet::from([Login::new("b")]));
    assert!(!outcome.report.has_failures());
}

#[tokio::test]
async fn failed_removal_stays_in_result() {
    let backend = FakeBackend::new("a")
        .with_member("a")
        .with_member("c")
        .fail_remove("c");
    let reconciler = MembershipReconciler::new(&backend);

    let outcome = reconciler
        .reconcile(&desired(&["a", "b"], &["b"]), None, None)
        .await
        .unwrap();

    assert_eq!(outcome.members, logins(&["a", "b", "c"]));
    let failed: Vec<_> = outcome
        .report
        .failures()
        .map(|r| (r.login.as_str(), r.kind))
        .collect();
    assert_eq!(failed, vec![("c", OperationKind::Remove)]);
}

#[tokio::test]
async fn failed_addition_is_dropped_from_result() {
    let backend = FakeBackend::new("a")
        .with_member("a")
        .fail_add("b", Permission::Push);
    let reconciler = MembershipReconciler::new(&backend);

    let outcome = reconciler
        .reconcile(&desired(&["a", "b"], &[]), None, None)
        .await
        .unwrap();

    assert_eq!(outcome.members, logins(&["a"]));
    assert!(outcome.report.has_failures());
}

#[tokio::test]
async fn owner_listed_as_admin_is_promoted() {
    let backend = FakeBackend::new("a").with_member("a");
    let reconciler = MembershipReconciler::new(&backend);

    let outcome = reconciler
        .reconcile(&desired(&["a"], &["a"]), None, None)
        .await
        .unwrap();

    assert_eq!(
        backend.mutations(),
        vec![remove("a"), add("a", Permission::Admin)]
    );
    assert_eq!(outcome.report.records()[0].kind, OperationKind::Promote);
    assert!(backend.admins().contains(&Login::new("a")));
}

#[tokio::test]
async fn owner_is_never_removed_and_stays_in_result() {
    let backend = FakeBackend::new("Owner")
        .with_admin("Owner")
        .with_member("a");
    let reconciler = MembershipReconciler::new(&backend);

    let outcome = reconciler
        .reconcile(&desired(&["a"], &[]), None, None)
        .await
        .unwrap();

    assert!(backend.mutations().is_empty());
    assert_eq!(outcome.members, logins(&["a", "owner"]));
    assert_eq!(
        outcome.report.records()[0].outcome,
        OperationOutcome::SkippedOwner
    );
}

#[tokio::test]
async fn owner_is_never_demoted() {
    let backend = FakeBackend::new("o").with_admin("o").with_admin("a");
    let reconciler = MembershipReconciler::new(&backend);

    reconciler
        .reconcile(&desired(&["o", "a"], &[]), None, None)
        .await
        .unwrap();

    assert_eq!(
        backend.mutations(),
        vec![remove("a"), add("a", Permission::Push)]
    );
    assert!(backend.admins().contains(&Login::new("o")));
}

#[tokio::test]
async fn case_differences_issue_no_operations() {
    let backend = FakeBackend::new("root").with_member("alice");
    let reconciler = MembershipReconciler::new(&backend);

    let outcome = reconciler
        .reconcile(&desired(&["Alice"], &[]), None, None)
        .await;

    // "root" is the owner but not a collaborator, so nothing is removed.
    let outcome = outcome.unwrap();
    assert!(backend.mutations().is_empty());
    assert_eq!(outcome.members, logins(&["alice"]));
}

#[tokio::test]
async fn admins_outside_membership_are_not_promoted() {
    let backend = FakeBackend::new("o").with_admin("o").with_member("a");
    let reconciler = MembershipReconciler::new(&backend);

    reconciler
        .reconcile(&desired(&["o", "a"], &["o", "mallory"]), None, None)
        .await
        .unwrap();

    assert!(backend.mutations().is_empty());
    assert!(!backend.members().contains(&Login::new("mallory")));
}

// ─── Fatal Errors ───

#[tokio::test]
async fn fetch_failure_aborts_before_any_mutation() {
    let backend = FakeBackend::new("o").with_member("x").fail_get_repo();
    let reconciler = MembershipReconciler::new(&backend);

    let result = reconciler.reconcile(&desired(&["a"], &[]), None, None).await;

    assert!(matches!(result, Err(ReconcileError::FetchRepo { .. })));
    assert_eq!(backend.effects(), vec![GitHubEffect::GetRepo]);
}

#[tokio::test]
async fn list_failure_aborts_before_any_mutation() {
    let backend = FakeBackend::new("o")
        .with_member("x")
        .fail_list_collaborators();
    let reconciler = MembershipReconciler::new(&backend);

    let result = reconciler.reconcile(&desired(&["a"], &[]), None, None).await;

    assert!(matches!(
        result,
        Err(ReconcileError::ListCollaborators { .. })
    ));
    assert!(backend.mutations().is_empty());
}

#[tokio::test]
async fn unknown_owner_does_not_block_additions_or_removals() {
    let backend = FakeBackend::new("a")
        .with_member("a")
        .with_member("x")
        .fail_get_repo();
    let reconciler = MembershipReconciler::new(&backend);
    let cached = logins(&["a", "x"]);

    let outcome = reconciler
        .reconcile(&desired(&["a", "b"], &[]), Some(cached.as_slice()), None)
        .await
        .unwrap();

    assert_eq!(
        backend.effects(),
        vec![
            GitHubEffect::ListCollaborators,
            add("b", Permission::Push),
            remove("x"),
        ]
    );
    assert_eq!(outcome.members, logins(&["a", "b"]));
    assert_eq!(outcome.owner, None);
}

#[tokio::test]
async fn unresolvable_owner_aborts_only_the_demotions() {
    let backend = FakeBackend::new("a")
        .with_member("a")
        .with_admin("d")
        .fail_get_repo();
    let reconciler = MembershipReconciler::new(&backend);
    let cached = logins(&["a", "d"]);

    let result = reconciler
        .reconcile(&desired(&["a", "b", "d"], &["a"]), Some(cached.as_slice()), None)
        .await;

    assert!(matches!(result, Err(ReconcileError::ResolveOwner { .. })));
    // Additions and promotions went out before the owner lookup.
    assert_eq!(
        backend.mutations(),
        vec![
            add("b", Permission::Push),
            remove("a"),
            add("a", Permission::Admin),
        ]
    );
    assert!(backend.admins().contains(&Login::new("d")));
}

#[tokio::test]
async fn unknown_owner_removal_is_refused_and_kept() {
    let backend = FakeBackend::new("o").with_admin("o").with_member("a");
    let reconciler = MembershipReconciler::new(&backend);
    let cached = logins(&["o", "a"]);

    let outcome = reconciler
        .reconcile(&desired(&["a"], &[]), Some(cached.as_slice()), None)
        .await
        .unwrap();

    assert!(!backend.effects().contains(&GitHubEffect::GetRepo));
    assert_eq!(backend.mutations(), vec![remove("o")]);
    assert_eq!(outcome.members, logins(&["a", "o"]));
    assert!(backend.members().contains(&Login::new("o")));
}

// ─── Cached Snapshots ───

#[tokio::test]
async fn cached_snapshot_skips_fetch_when_owner_irrelevant() {
    let backend = FakeBackend::new("o").with_member("a");
    let reconciler = MembershipReconciler::new(&backend);
    let cached = logins(&["a"]);

    let outcome = reconciler
        .reconcile(&desired(&["a", "b"], &[]), Some(cached.as_slice()), None)
        .await
        .unwrap();

    assert_eq!(
        backend.effects(),
        vec![GitHubEffect::ListCollaborators, add("b", Permission::Push)]
    );
    assert_eq!(outcome.owner, None);
    assert_eq!(outcome.members, logins(&["a", "b"]));
}

#[tokio::test]
async fn cached_snapshot_resolves_owner_once_before_demotions() {
    let backend = FakeBackend::new("o")
        .with_admin("o")
        .with_member("a")
        .with_admin("x");
    let reconciler = MembershipReconciler::new(&backend);
    let cached = logins(&["o", "a", "x"]);

    let outcome = reconciler
        .reconcile(&desired(&["o", "a", "x", "b"], &[]), Some(cached.as_slice()), None)
        .await
        .unwrap();

    assert_eq!(
        backend.effects(),
        vec![
            GitHubEffect::ListCollaborators,
            add("b", Permission::Push),
            GitHubEffect::GetRepo,
            remove("x"),
            add("x", Permission::Push),
        ]
    );
    assert_eq!(outcome.owner, Some(Login::new("o")));
    assert_eq!(outcome.members, logins(&["a", "b", "o", "x"]));
    assert!(backend.admins().contains(&Login::new("o")));
}

#[tokio::test]
async fn owner_hint_avoids_fetch() {
    let backend = FakeBackend::new("o").with_member("o").with_member("x");
    let reconciler = MembershipReconciler::new(&backend);
    let cached = logins(&["o", "x"]);

    reconciler
        .reconcile(&desired(&[], &[]), Some(cached.as_slice()), Some(Login::new("o")))
        .await
        .unwrap();

    assert_eq!(
        backend.effects(),
        vec![GitHubEffect::ListCollaborators, remove("x")]
    );
}

#[tokio::test]
async fn empty_cached_snapshot_triggers_fetch() {
    let backend = FakeBackend::new("o").with_member("a");
    let reconciler = MembershipReconciler::new(&backend);

    reconciler
        .reconcile(&desired(&["a"], &[]), Some(Vec::new().as_slice()), None)
        .await
        .unwrap();

    assert_eq!(backend.effects()[0], GitHubEffect::GetRepo);
}

#[tokio::test]
async fn second_run_issues_no_mutations() {
    let backend = FakeBackend::new("a")
        .with_member("a")
        .with_member("c")
        .with_admin("d");
    let reconciler = MembershipReconciler::new(&backend);
    let desired = desired(&["a", "b", "d"], &["b"]);

    let first = reconciler.reconcile(&desired, None, None).await.unwrap();
    backend.clear_log();
    let second = reconciler
        .reconcile(&desired, Some(first.members.as_slice()), first.owner.clone())
        .await
        .unwrap();

    assert!(backend.mutations().is_empty());
    assert!(second.report.is_noop());
    assert_eq!(second.members, first.members);
}

#[tokio::test]
async fn dry_run_reports_without_mutating() {
    let backend = FakeBackend::new("a").with_member("a").with_member("c");
    let reconciler = MembershipReconciler::new(DryRunInterpreter::new(&backend));

    let outcome = reconciler
        .reconcile(&desired(&["a", "b"], &["b"]), None, None)
        .await
        .unwrap();

    assert!(backend.mutations().is_empty());
    assert_eq!(outcome.report.summary().added, 1);
    assert_eq!(outcome.report.summary().removed, 1);
    assert_eq!(outcome.report.summary().promoted, 1);
    assert_eq!(backend.members(), logins(&["a", "c"]).into_iter().collect::<BTreeSet<_>>());
}

// ─── Property Tests ───

struct Scenario {
    owner: Login,
    observed_members: BTreeSet<Login>,
    observed_admins: BTreeSet<Login>,
    desired: DesiredState,
}

impl Scenario {
    fn backend(&self) -> FakeBackend {
        let mut backend = FakeBackend::new(self.owner.as_str());
        for login in &self.observed_members {
            backend = backend.with_member(login.as_str());
        }
        for login in &self.observed_admins {
            backend = backend.with_admin(login.as_str());
        }
        backend
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("owner", &self.owner)
            .field("observed_members", &self.observed_members)
            .field("observed_admins", &self.observed_admins)
            .field("desired_members", &self.desired.members)
            .field("desired_admins", &self.desired.admins)
            .finish()
    }
}

fn arb_scenario() -> impl Strategy<Value = Scenario> {
    (
        arb_login(),
        arb_login_set(),
        arb_login_set(),
        arb_login_set(),
        arb_login_set(),
    )
        .prop_map(
            |(owner, observed_members, observed_admins, members, admins)| Scenario {
                owner,
                observed_members,
                observed_admins,
                desired: DesiredState {
                    repo: RepoId::new("acme", "widgets"),
                    members,
                    admins,
                },
            },
        )
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    /// Property: a second run over unchanged state issues no mutations.
    #[test]
    fn prop_reconcile_is_idempotent(scenario in arb_scenario()) {
        let backend = scenario.backend();
        let reconciler = MembershipReconciler::new(&backend);

        let (first, second) = block_on(async {
            let first = reconciler.reconcile(&scenario.desired, None, None).await.unwrap();
            backend.clear_log();
            let second = reconciler
                .reconcile(&scenario.desired, Some(first.members.as_slice()), first.owner.clone())
                .await
                .unwrap();
            (first, second)
        });

        prop_assert!(backend.mutations().is_empty(), "second run mutated: {:?}", backend.mutations());
        prop_assert!(second.report.is_noop());
        prop_assert_eq!(second.members, first.members);
    }

    /// Property: an observed owner is always part of the resulting membership.
    #[test]
    fn prop_observed_owner_stays_in_result(scenario in arb_scenario()) {
        let backend = scenario.backend();
        let owner_observed = backend.members().contains(&scenario.owner);
        let reconciler = MembershipReconciler::new(&backend);

        let outcome = block_on(reconciler.reconcile(&scenario.desired, None, None)).unwrap();

        if owner_observed {
            prop_assert!(outcome.members.contains(&scenario.owner));
        }
    }

    /// Property: logins requested as admin but not as member never gain admin.
    #[test]
    fn prop_membership_gates_promotion(scenario in arb_scenario()) {
        let backend = scenario.backend();
        let reconciler = MembershipReconciler::new(&backend);

        block_on(reconciler.reconcile(&scenario.desired, None, None)).unwrap();

        for login in scenario.desired.ungated_admins() {
            prop_assert!(!backend.mutations().contains(&add(login.as_str(), Permission::Admin)));
        }
    }

    /// Property: with no failures, the backend ends up exactly as desired,
    /// apart from the owner.
    #[test]
    fn prop_converges_in_one_run(scenario in arb_scenario()) {
        let backend = scenario.backend();
        let reconciler = MembershipReconciler::new(&backend);

        let outcome = block_on(reconciler.reconcile(&scenario.desired, None, None)).unwrap();

        let mut expected = scenario.desired.members.clone();
        if scenario.observed_members.contains(&scenario.owner)
            || scenario.observed_admins.contains(&scenario.owner)
        {
            expected.insert(scenario.owner.clone());
        }
        prop_assert_eq!(backend.members(), expected.clone());
        prop_assert_eq!(outcome.members.into_iter().collect::<BTreeSet<_>>(), expected);
    }
}
