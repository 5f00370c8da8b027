// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The run state machine.
//!
//! A [`Run`] is an immutable value; every transformation returns a new value.
//! All mutation happens as read-modify-write under the owning job lock.

use crate::certificate::TesterCertificate;
use crate::job::{RunId, Versions};
use crate::step::{JobProfile, Step, StepStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Terminal label for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Aborted,
    Error,
    TestFailure,
    DeploymentFailed,
    InstallationFailed,
    OutOfCapacity,
    Success,
}

impl RunStatus {
    /// Whether this status lets its step count as succeeded.
    pub fn is_ok(self) -> bool {
        matches!(self, RunStatus::Running | RunStatus::Success)
    }
}

crate::simple_display! {
    RunStatus {
        Running => "running",
        Aborted => "aborted",
        Error => "error",
        TestFailure => "test_failure",
        DeploymentFailed => "deployment_failed",
        InstallationFailed => "installation_failed",
        OutOfCapacity => "out_of_capacity",
        Success => "success",
    }
}

/// Violations of the run's invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("tester certificate already set on {0}")]
    CertificateAlreadySet(RunId),
    #[error("{0} has already ended")]
    AlreadyEnded(RunId),
    #[error("cannot finish {0}: step {1} is still unfinished")]
    UnfinishedStep(RunId, Step),
}

/// One execution of a job for an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    id: RunId,
    versions: Versions,
    start_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_ms: Option<u64>,
    status: RunStatus,
    steps: BTreeMap<Step, StepStatus>,
    /// High-water mark of test log entries already fetched from the tester.
    last_test_log_entry: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tester_certificate: Option<TesterCertificate>,
}

impl Run {
    /// A fresh run with every profile step unfinished.
    pub fn initial(id: RunId, versions: Versions, now_ms: u64) -> Self {
        let steps = JobProfile::of(id.job_type())
            .steps()
            .iter()
            .map(|&step| (step, StepStatus::Unfinished))
            .collect();
        Self {
            id,
            versions,
            start_ms: now_ms,
            end_ms: None,
            status: RunStatus::Running,
            steps,
            last_test_log_entry: 0,
            tester_certificate: None,
        }
    }

    pub fn id(&self) -> &RunId {
        &self.id
    }

    pub fn versions(&self) -> &Versions {
        &self.versions
    }

    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> Option<u64> {
        self.end_ms
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn steps(&self) -> &BTreeMap<Step, StepStatus> {
        &self.steps
    }

    pub fn step_status(&self, step: Step) -> Option<StepStatus> {
        self.steps.get(&step).copied()
    }

    pub fn last_test_log_entry(&self) -> u64 {
        self.last_test_log_entry
    }

    pub fn tester_certificate(&self) -> Option<&TesterCertificate> {
        self.tester_certificate.as_ref()
    }

    pub fn profile(&self) -> JobProfile {
        JobProfile::of(self.id.job_type())
    }

    /// A run is active until it gets its end instant.
    pub fn has_ended(&self) -> bool {
        self.end_ms.is_some()
    }

    pub fn has_failed(&self) -> bool {
        !self.status.is_ok()
    }

    /// Fold a step outcome into the run: the step becomes succeeded or
    /// failed, and a terminal outcome becomes the run's status unless the
    /// run has already failed.
    pub fn with_step_status(mut self, status: RunStatus, step: Step) -> Self {
        let step_status =
            if status.is_ok() { StepStatus::Succeeded } else { StepStatus::Failed };
        self.steps.insert(step, step_status);
        if !status.is_ok() && !self.has_failed() {
            self.status = status;
        }
        self
    }

    /// Advance the test log high-water mark. Never regresses.
    pub fn with_last_test_log_entry(mut self, id: u64) -> Self {
        self.last_test_log_entry = self.last_test_log_entry.max(id);
        self
    }

    /// Attach the tester certificate. A run gets at most one.
    pub fn with_tester_certificate(
        mut self,
        certificate: TesterCertificate,
    ) -> Result<Self, RunError> {
        if self.tester_certificate.is_some() {
            return Err(RunError::CertificateAlreadySet(self.id));
        }
        self.tester_certificate = Some(certificate);
        Ok(self)
    }

    /// Mark the run aborted, unless it already carries a terminal failure.
    pub fn aborted(mut self) -> Self {
        if !self.has_failed() {
            self.status = RunStatus::Aborted;
        }
        self
    }

    /// Seal the run with its end instant. A run that is still `Running`
    /// becomes `Success`, and must have no ordinary step unfinished.
    pub fn finished(mut self, now_ms: u64) -> Result<Self, RunError> {
        if self.has_ended() {
            return Err(RunError::AlreadyEnded(self.id));
        }
        if self.status == RunStatus::Running {
            let profile = self.profile();
            if let Some(&step) = self.steps.iter().find_map(|(step, status)| {
                (*status == StepStatus::Unfinished && !profile.is_always_run(*step))
                    .then_some(step)
            }) {
                return Err(RunError::UnfinishedStep(self.id, step));
            }
            self.status = RunStatus::Success;
        }
        self.end_ms = Some(now_ms);
        Ok(self)
    }

    /// The steps that may be dispatched now, in enumeration order.
    ///
    /// While the run is in ordinary progress a step is ready once every
    /// profile prerequisite has succeeded. Once the run has failed or been
    /// aborted only always-run cleanup steps are ready, gated on their
    /// always-run prerequisites being terminal so that cleanup drains even
    /// past a failed predecessor.
    pub fn ready_steps(&self) -> Vec<Step> {
        if self.has_ended() {
            return Vec::new();
        }
        let profile = self.profile();
        if self.has_failed() {
            profile
                .always_run()
                .iter()
                .copied()
                .filter(|&step| {
                    self.step_status(step) == Some(StepStatus::Unfinished)
                        && profile
                            .prerequisites_of(step)
                            .into_iter()
                            .filter(|p| profile.is_always_run(*p))
                            .all(|p| {
                                self.step_status(p).is_some_and(StepStatus::is_terminal)
                            })
                })
                .collect()
        } else {
            profile
                .steps()
                .iter()
                .copied()
                .filter(|&step| {
                    self.step_status(step) == Some(StepStatus::Unfinished)
                        && profile
                            .prerequisites_of(step)
                            .into_iter()
                            .all(|p| self.step_status(p) == Some(StepStatus::Succeeded))
                })
                .collect()
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
