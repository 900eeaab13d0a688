//! Pure computation of the operations needed to converge membership.
//!
//! Planning happens in two steps because the owner may be unknown when the
//! candidate sets are first computed:
//!
//! 1. [`MembershipDiff::compute`] derives the raw set differences.
//! 2. [`MembershipDiff::into_plan`] applies the owner exemption for whatever
//!    owner is known at that point.
//!
//! An unknown owner is only resolved for demotions, after every other operation
//! has run; [`MembershipPlan::exempt_owner_from_demotions`] then applies the late
//! exemption. Removals with an unknown owner go ahead and rely on the backend
//! refusing to remove the owner.

use std::collections::BTreeSet;

use super::state::{DesiredState, ObservedState};
use crate::types::Login;

/// Raw set differences between desired and observed membership, before the
/// owner exemption is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipDiff {
    retained: BTreeSet<Login>,
    additions: BTreeSet<Login>,
    removal_candidates: BTreeSet<Login>,
    promotions: BTreeSet<Login>,
    demotion_candidates: BTreeSet<Login>,
}

impl MembershipDiff {
    pub fn compute(desired: &DesiredState, observed: &ObservedState) -> Self {
        let retained = desired
            .members
            .intersection(&observed.members)
            .cloned()
            .collect();
        let additions = desired
            .members
            .difference(&observed.members)
            .cloned()
            .collect();
        let removal_candidates = observed
            .members
            .difference(&desired.members)
            .cloned()
            .collect();

        // Membership gates role changes in both directions.
        let promotions = desired
            .admins
            .difference(&observed.admins)
            .filter(|login| desired.members.contains(*login))
            .cloned()
            .collect();
        let demotion_candidates = observed
            .admins
            .difference(&desired.admins)
            .filter(|login| desired.members.contains(*login))
            .cloned()
            .collect();

        MembershipDiff {
            retained,
            additions,
            removal_candidates,
            promotions,
            demotion_candidates,
        }
    }

    /// Applies the owner exemption and produces the final plan.
    ///
    /// The owner is never removed and never demoted. It may still be promoted.
    pub fn into_plan(self, owner: Option<&Login>) -> MembershipPlan {
        let MembershipDiff {
            retained,
            additions,
            mut removal_candidates,
            promotions,
            mut demotion_candidates,
        } = self;

        let owner_exempt_removal = owner.and_then(|o| removal_candidates.take(o));
        let owner_exempt_demotion = owner.and_then(|o| demotion_candidates.take(o));

        MembershipPlan {
            retained,
            additions,
            removals: removal_candidates,
            promotions,
            demotions: demotion_candidates,
            owner_exempt_removal,
            owner_exempt_demotion,
        }
    }
}

/// The operations one reconciliation call will issue.
///
/// `additions` and `removals` change membership; `promotions` and `demotions`
/// only change role and are each executed as revoke-then-grant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipPlan {
    /// Expected members already present.
    pub retained: BTreeSet<Login>,
    /// Expected members not yet present; granted push.
    pub additions: BTreeSet<Login>,
    /// Present members no longer expected, owner excluded.
    pub removals: BTreeSet<Login>,
    /// Expected members that should become admin.
    pub promotions: BTreeSet<Login>,
    /// Expected members that should drop to push, owner excluded.
    pub demotions: BTreeSet<Login>,
    /// Set when the owner was a removal candidate.
    pub owner_exempt_removal: Option<Login>,
    /// Set when the owner was a demotion candidate.
    pub owner_exempt_demotion: Option<Login>,
}

impl MembershipPlan {
    /// Returns true if executing this plan issues no mutation.
    pub fn is_noop(&self) -> bool {
        self.additions.is_empty()
            && self.removals.is_empty()
            && self.promotions.is_empty()
            && self.demotions.is_empty()
    }

    /// Number of mutating API calls the plan will issue.
    ///
    /// Role changes cost two calls each.
    pub fn call_count(&self) -> usize {
        self.additions.len()
            + self.removals.len()
            + 2 * (self.promotions.len() + self.demotions.len())
    }

    /// Returns true if demotions are pending but the owner, who must be
    /// skipped, is not yet known.
    pub fn demotions_await_owner(&self, owner: Option<&Login>) -> bool {
        owner.is_none() && !self.demotions.is_empty()
    }

    /// Takes a late-resolved owner out of the pending demotions.
    pub fn exempt_owner_from_demotions(&mut self, owner: &Login) {
        if let Some(owner) = self.demotions.take(owner) {
            self.owner_exempt_demotion = Some(owner);
        }
    }
}
