//! Collaborator membership reconciliation.
//!
//! Given the desired members and admins of a repository and the state the
//! backend reports, this module computes and applies the operations needed to
//! converge them.
//!
//! # Architecture
//!
//! - [`plan`]: pure set arithmetic producing a [`MembershipPlan`]
//! - [`engine`]: fetches state, applies the plan through a `GitHubInterpreter`
//! - [`report`]: per-operation outcomes
//!
//! # Key Invariants
//!
//! 1. **Case-insensitive logins**: every login is folded to lower case before
//!    comparison.
//!
//! 2. **Owner exemption**: the repository owner is never removed or demoted,
//!    and stays in the resulting membership if it was observed.
//!
//! 3. **Membership gates roles**: only expected members are promoted or
//!    demoted.
//!
//! 4. **No atomic role change**: a role change is revoke-then-grant with no
//!    rollback; convergence comes from re-running reconciliation.

pub mod engine;
pub mod plan;
pub mod report;
pub mod state;

#[cfg(test)]
mod tests;

pub use engine::{MembershipReconciler, ReconcileError, ReconcileOutcome};
pub use plan::{MembershipDiff, MembershipPlan};
pub use report::{OperationKind, OperationOutcome, OperationRecord, ReconcileReport, ReportSummary};
pub use state::{DesiredState, ObservedState};
