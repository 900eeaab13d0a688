//! Per-operation outcomes of a reconciliation call.

use std::fmt;

use serde::Serialize;

use crate::types::Login;

/// The kind of membership operation attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Add,
    Remove,
    Promote,
    Demote,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Add => "add",
            OperationKind::Remove => "remove",
            OperationKind::Promote => "promote",
            OperationKind::Demote => "demote",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a single operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationOutcome {
    /// Every API call succeeded.
    Applied,

    /// The single API call of an add or remove failed.
    Failed { error: String },

    /// At least one half of a revoke-then-grant role change failed.
    ///
    /// A successful revoke followed by a failed grant leaves the login with no
    /// access; the next cycle's addition step restores push access.
    RoleChangeFailed {
        revoke_error: Option<String>,
        grant_error: Option<String>,
    },

    /// The login is the repository owner, which is never removed or demoted.
    SkippedOwner,
}

impl OperationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            OperationOutcome::Failed { .. } | OperationOutcome::RoleChangeFailed { .. }
        )
    }

    /// Returns true if a role change revoked access but could not grant it back.
    pub fn left_without_access(&self) -> bool {
        matches!(
            self,
            OperationOutcome::RoleChangeFailed {
                revoke_error: None,
                grant_error: Some(_),
            }
        )
    }
}

/// One entry of a [`ReconcileReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationRecord {
    pub login: Login,
    pub kind: OperationKind,
    pub outcome: OperationOutcome,
}

/// Ordered record of every operation a reconciliation call attempted or skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    records: Vec<OperationRecord>,
}

impl ReconcileReport {
    pub fn record(&mut self, login: Login, kind: OperationKind, outcome: OperationOutcome) {
        self.records.push(OperationRecord {
            login,
            kind,
            outcome,
        });
    }

    pub fn records(&self) -> &[OperationRecord] {
        &self.records
    }

    pub fn failures(&self) -> impl Iterator<Item = &OperationRecord> {
        self.records.iter().filter(|r| r.outcome.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Returns true if no operation was attempted. Owner skips don't count.
    pub fn is_noop(&self) -> bool {
        self.records
            .iter()
            .all(|r| r.outcome == OperationOutcome::SkippedOwner)
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for record in &self.records {
            match (&record.outcome, record.kind) {
                (OperationOutcome::Applied, OperationKind::Add) => summary.added += 1,
                (OperationOutcome::Applied, OperationKind::Remove) => summary.removed += 1,
                (OperationOutcome::Applied, OperationKind::Promote) => summary.promoted += 1,
                (OperationOutcome::Applied, OperationKind::Demote) => summary.demoted += 1,
                (OperationOutcome::SkippedOwner, _) => summary.skipped += 1,
                _ => summary.failed += 1,
            }
        }
        summary
    }
}

/// Counts of operation outcomes, for one-line logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub added: usize,
    pub removed: usize,
    pub promoted: usize,
    pub demoted: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} removed, {} promoted, {} demoted, {} failed, {} skipped",
            self.added, self.removed, self.promoted, self.demoted, self.failed, self.skipped
        )
    }
}
