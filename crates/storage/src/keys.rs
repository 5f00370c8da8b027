// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock names for the store's lock scopes.

use ro_core::{ApplicationId, JobType, Step};
use std::fmt;

/// A leased lock's name. Locks are always acquired application before job
/// before step; the run lock is the job lock (a job has at most one active
/// run, so the two scopes coincide).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockKey {
    /// Serialises writes to one application's registry entry.
    Application(ApplicationId),
    /// Serialises writes to one job's last run and history.
    Job(ApplicationId, JobType),
    /// Held while one step of the job's active run executes.
    Step(ApplicationId, JobType, Step),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Application(id) => write!(f, "{id}"),
            LockKey::Job(id, job) => write!(f, "{id}/{job}"),
            LockKey::Step(id, job, step) => write!(f, "{id}/{job}/{step}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ro_core::test_support::app_id;

    #[test]
    fn display_forms_are_path_like() {
        assert_eq!(LockKey::Application(app_id()).to_string(), "tenant.real.default");
        assert_eq!(
            LockKey::Job(app_id(), JobType::SystemTest).to_string(),
            "tenant.real.default/system-test"
        );
        assert_eq!(
            LockKey::Step(app_id(), JobType::SystemTest, Step::DeployReal).to_string(),
            "tenant.real.default/system-test/deploy-real"
        );
    }

    #[test]
    fn scopes_are_distinct_keys() {
        assert_ne!(
            LockKey::Job(app_id(), JobType::SystemTest),
            LockKey::Step(app_id(), JobType::SystemTest, Step::Report)
        );
    }
}
