//! Shared test utilities: a stateful fake backend and arbitrary generators for
//! property-based testing.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::future::Future;
use std::sync::Mutex;

use proptest::prelude::*;

use crate::effects::{
    CollaboratorData, GitHubEffect, GitHubInterpreter, GitHubResponse, Permission,
    RepoMembersData,
};
use crate::types::Login;

pub fn arb_login() -> impl Strategy<Value = Login> {
    "[a-zA-Z][a-zA-Z0-9]{0,3}".prop_map(Login::new)
}

pub fn arb_login_set() -> impl Strategy<Value = BTreeSet<Login>> {
    prop::collection::btree_set(arb_login(), 0..8)
}

#[derive(Debug, Clone)]
struct FakeCollaborator {
    /// Spelling as first granted, to mimic GitHub preserving login case.
    login: String,
    is_admin: bool,
}

#[derive(Debug, Default)]
struct FakeState {
    owner: String,
    collaborators: BTreeMap<Login, FakeCollaborator>,
    fail_get_repo: bool,
    fail_list_collaborators: bool,
    fail_add: HashSet<(Login, Permission)>,
    fail_remove: HashSet<Login>,
}

/// An in-memory permissions backend.
///
/// Mutations update the collaborator table, so consecutive reconciliations see
/// each other's effects. Every interpreted effect is recorded in order.
/// Removing the owner is refused, as GitHub does.
#[derive(Debug, Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
    log: Mutex<Vec<GitHubEffect>>,
}

impl FakeBackend {
    pub fn new(owner: &str) -> Self {
        FakeBackend {
            state: Mutex::new(FakeState {
                owner: owner.to_string(),
                ..FakeState::default()
            }),
            log: Mutex::new(Vec::new()),
        }
    }

    fn with_collaborator(self, login: &str, is_admin: bool) -> Self {
        self.state.lock().unwrap().collaborators.insert(
            Login::new(login),
            FakeCollaborator {
                login: login.to_string(),
                is_admin,
            },
        );
        self
    }

    pub fn with_member(self, login: &str) -> Self {
        self.with_collaborator(login, false)
    }

    pub fn with_admin(self, login: &str) -> Self {
        self.with_collaborator(login, true)
    }

    pub fn fail_get_repo(self) -> Self {
        self.state.lock().unwrap().fail_get_repo = true;
        self
    }

    pub fn fail_list_collaborators(self) -> Self {
        self.state.lock().unwrap().fail_list_collaborators = true;
        self
    }

    pub fn fail_add(self, login: &str, permission: Permission) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_add
            .insert((Login::new(login), permission));
        self
    }

    pub fn fail_remove(self, login: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_remove
            .insert(Login::new(login));
        self
    }

    /// Every effect interpreted so far, in order.
    pub fn effects(&self) -> Vec<GitHubEffect> {
        self.log.lock().unwrap().clone()
    }

    /// Only the mutating effects interpreted so far.
    pub fn mutations(&self) -> Vec<GitHubEffect> {
        self.effects()
            .into_iter()
            .filter(GitHubEffect::is_mutation)
            .collect()
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap().clear();
    }

    pub fn members(&self) -> BTreeSet<Login> {
        self.state
            .lock()
            .unwrap()
            .collaborators
            .keys()
            .cloned()
            .collect()
    }

    pub fn admins(&self) -> BTreeSet<Login> {
        self.state
            .lock()
            .unwrap()
            .collaborators
            .iter()
            .filter(|(_, c)| c.is_admin)
            .map(|(login, _)| login.clone())
            .collect()
    }

    fn apply(&self, effect: &GitHubEffect) -> Result<GitHubResponse, String> {
        let mut state = self.state.lock().unwrap();
        match effect {
            GitHubEffect::GetRepo => {
                if state.fail_get_repo {
                    return Err("get repo failed".to_string());
                }
                Ok(GitHubResponse::RepoMembers(RepoMembersData {
                    owner: state.owner.clone(),
                    members: state
                        .collaborators
                        .values()
                        .map(|c| c.login.clone())
                        .collect(),
                }))
            }
            GitHubEffect::ListCollaborators => {
                if state.fail_list_collaborators {
                    return Err("list collaborators failed".to_string());
                }
                Ok(GitHubResponse::Collaborators(
                    state
                        .collaborators
                        .values()
                        .map(|c| CollaboratorData {
                            login: c.login.clone(),
                            is_admin: c.is_admin,
                        })
                        .collect(),
                ))
            }
            GitHubEffect::AddCollaborator { login, permission } => {
                let key = Login::new(login);
                if state.fail_add.contains(&(key.clone(), *permission)) {
                    return Err(format!("add {} failed", login));
                }
                let is_admin = *permission == Permission::Admin;
                state
                    .collaborators
                    .entry(key)
                    .and_modify(|c| c.is_admin = is_admin)
                    .or_insert_with(|| FakeCollaborator {
                        login: login.clone(),
                        is_admin,
                    });
                Ok(GitHubResponse::CollaboratorAdded)
            }
            GitHubEffect::RemoveCollaborator { login } => {
                let key = Login::new(login);
                if state.fail_remove.contains(&key) {
                    return Err(format!("remove {} failed", login));
                }
                if key.matches(&state.owner) {
                    return Err("cannot remove the repository owner".to_string());
                }
                state.collaborators.remove(&key);
                Ok(GitHubResponse::CollaboratorRemoved)
            }
        }
    }
}

impl GitHubInterpreter for FakeBackend {
    type Error = String;

    fn interpret(
        &self,
        effect: GitHubEffect,
    ) -> impl Future<Output = Result<GitHubResponse, Self::Error>> + Send {
        self.log.lock().unwrap().push(effect.clone());
        let result = self.apply(&effect);
        async move { result }
    }
}
