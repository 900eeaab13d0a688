//! Core domain types for membership reconciliation.
//!
//! These types encode the invariants the reconciler relies on, most importantly
//! that logins compare case-insensitively.

pub mod ids;

pub use ids::{Login, RepoId};
