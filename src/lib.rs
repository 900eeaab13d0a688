//! Membership Sync - converges GitHub repository collaborators to a declared state.
//!
//! This library provides the core domain types, the reconciliation engine, and
//! the octocrab-backed GitHub interpreter used by the `membership-sync` binary.

pub mod config;
pub mod effects;
pub mod github;
pub mod reconcile;
pub mod types;

#[cfg(test)]
pub mod test_utils;
