// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The step registry: the finite set of steps, their prerequisite DAG, and
//! the per-job profiles selecting which subset runs.

use crate::job::JobType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One unit of work within a run.
///
/// Enumeration order is the stable presentation order for ready steps.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    DeployTester,
    InstallTester,
    DeployInitialReal,
    InstallInitialReal,
    DeployReal,
    InstallReal,
    StartTests,
    EndTests,
    CopyLogs,
    DeactivateReal,
    DeactivateTester,
    Report,
}

impl Step {
    pub const ALL: [Step; 12] = [
        Step::DeployTester,
        Step::InstallTester,
        Step::DeployInitialReal,
        Step::InstallInitialReal,
        Step::DeployReal,
        Step::InstallReal,
        Step::StartTests,
        Step::EndTests,
        Step::CopyLogs,
        Step::DeactivateReal,
        Step::DeactivateTester,
        Step::Report,
    ];

    /// Direct prerequisites. The full relation forms a DAG.
    pub fn prerequisites(self) -> &'static [Step] {
        match self {
            Step::DeployTester => &[],
            Step::InstallTester => &[Step::DeployTester],
            Step::DeployInitialReal => &[],
            Step::InstallInitialReal => &[Step::DeployInitialReal],
            Step::DeployReal => &[Step::InstallInitialReal],
            Step::InstallReal => &[Step::DeployReal],
            Step::StartTests => &[Step::InstallReal, Step::InstallTester],
            Step::EndTests => &[Step::StartTests],
            Step::CopyLogs => &[Step::EndTests],
            Step::DeactivateReal => &[Step::CopyLogs],
            Step::DeactivateTester => &[Step::CopyLogs],
            Step::Report => &[Step::DeactivateReal, Step::DeactivateTester],
        }
    }

    /// Transitive prerequisite closure. Gating against a profile intersects
    /// this with the profile's steps, so steps absent from a profile are
    /// skipped over rather than blocking their successors.
    pub fn all_prerequisites(self) -> BTreeSet<Step> {
        let mut closure = BTreeSet::new();
        let mut frontier = vec![self];
        while let Some(step) = frontier.pop() {
            for &prerequisite in step.prerequisites() {
                if closure.insert(prerequisite) {
                    frontier.push(prerequisite);
                }
            }
        }
        closure
    }
}

crate::simple_display! {
    Step {
        DeployTester => "deploy-tester",
        InstallTester => "install-tester",
        DeployInitialReal => "deploy-initial-real",
        InstallInitialReal => "install-initial-real",
        DeployReal => "deploy-real",
        InstallReal => "install-real",
        StartTests => "start-tests",
        EndTests => "end-tests",
        CopyLogs => "copy-logs",
        DeactivateReal => "deactivate-real",
        DeactivateTester => "deactivate-tester",
        Report => "report",
    }
}

/// The state of one step within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Unfinished,
    Succeeded,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        self != StepStatus::Unfinished
    }
}

crate::simple_display! {
    StepStatus {
        Unfinished => "unfinished",
        Succeeded => "succeeded",
        Failed => "failed",
    }
}

/// The selection of steps a job performs, plus the always-run subset that
/// executes even after the run has failed or been aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobProfile {
    steps: &'static [Step],
    always_run: &'static [Step],
}

const TEST_CLEANUP: &[Step] =
    &[Step::CopyLogs, Step::DeactivateReal, Step::DeactivateTester, Step::Report];

const SYSTEM_TEST_STEPS: &[Step] = &[
    Step::DeployTester,
    Step::InstallTester,
    Step::DeployReal,
    Step::InstallReal,
    Step::StartTests,
    Step::EndTests,
    Step::CopyLogs,
    Step::DeactivateReal,
    Step::DeactivateTester,
    Step::Report,
];

const STAGING_TEST_STEPS: &[Step] = &Step::ALL;

const PRODUCTION_STEPS: &[Step] = &[Step::DeployReal, Step::InstallReal, Step::Report];

const DEV_STEPS: &[Step] = &[Step::DeployReal, Step::InstallReal];

impl JobProfile {
    pub fn of(job_type: JobType) -> Self {
        match job_type {
            JobType::SystemTest => {
                Self { steps: SYSTEM_TEST_STEPS, always_run: TEST_CLEANUP }
            }
            JobType::StagingTest => {
                Self { steps: STAGING_TEST_STEPS, always_run: TEST_CLEANUP }
            }
            JobType::ProductionUsEast3 | JobType::ProductionUsWest1 => {
                Self { steps: PRODUCTION_STEPS, always_run: &[Step::Report] }
            }
            JobType::DevUsEast1 => Self { steps: DEV_STEPS, always_run: &[] },
        }
    }

    /// All steps of the profile, in enumeration order.
    pub fn steps(&self) -> &'static [Step] {
        self.steps
    }

    pub fn always_run(&self) -> &'static [Step] {
        self.always_run
    }

    pub fn contains(&self, step: Step) -> bool {
        self.steps.contains(&step)
    }

    pub fn is_always_run(&self, step: Step) -> bool {
        self.always_run.contains(&step)
    }

    /// This step's transitive prerequisites that are part of the profile.
    pub fn prerequisites_of(&self, step: Step) -> Vec<Step> {
        step.all_prerequisites().into_iter().filter(|s| self.contains(*s)).collect()
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
