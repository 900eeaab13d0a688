//! Desired and observed membership state.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{Login, RepoId};

/// Target membership for one repository.
///
/// `members` decides who has any access at all. `admins` only selects which of
/// those members hold the admin role: a login listed as admin but absent from
/// `members` is never promoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    pub repo: RepoId,
    pub members: BTreeSet<Login>,
    pub admins: BTreeSet<Login>,
}

impl DesiredState {
    pub fn new<M, A>(repo: RepoId, members: M, admins: A) -> Self
    where
        M: IntoIterator,
        M::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        DesiredState {
            repo,
            members: members.into_iter().map(Login::new).collect(),
            admins: admins.into_iter().map(Login::new).collect(),
        }
    }

    /// Admins that will never be promoted because they are not expected members.
    pub fn ungated_admins(&self) -> BTreeSet<Login> {
        self.admins.difference(&self.members).cloned().collect()
    }
}

/// Membership as reported by the backend for one reconciliation call.
///
/// Logins are normalised, but the spelling the backend reported is kept so it
/// can be passed back verbatim in API calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedState {
    pub members: BTreeSet<Login>,
    pub admins: BTreeSet<Login>,
    /// `None` until fetched or supplied by the caller.
    pub owner: Option<Login>,
    spellings: BTreeMap<Login, String>,
}

impl ObservedState {
    pub fn new(owner: Option<Login>) -> Self {
        ObservedState {
            owner,
            ..ObservedState::default()
        }
    }

    /// Records a collaborator of any role, remembering its reported spelling.
    pub fn add_member(&mut self, reported: &str) -> Login {
        let login = Login::new(reported);
        self.spellings
            .entry(login.clone())
            .or_insert_with(|| reported.to_string());
        self.members.insert(login.clone());
        login
    }

    /// Records an admin. Admins are tracked apart from `members`, whose
    /// snapshot may be older than the collaborator listing.
    pub fn add_admin(&mut self, reported: &str) -> Login {
        let login = Login::new(reported);
        self.spellings
            .entry(login.clone())
            .or_insert_with(|| reported.to_string());
        self.admins.insert(login.clone());
        login
    }

    /// Notes the reported spelling of a login without changing membership.
    pub fn note_spelling(&mut self, reported: &str) {
        self.spellings
            .entry(Login::new(reported))
            .or_insert_with(|| reported.to_string());
    }

    /// The login as the backend spells it, falling back to the normalised form.
    pub fn api_login<'a>(&'a self, login: &'a Login) -> &'a str {
        self.spellings
            .get(login)
            .map(String::as_str)
            .unwrap_or(login.as_str())
    }
}
