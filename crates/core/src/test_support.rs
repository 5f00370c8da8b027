// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

#![allow(clippy::unwrap_used)]

use crate::application::{ApplicationId, SourceRevision};
use crate::job::{JobType, RunId, Versions};
use crate::version::PlatformVersion;

/// The application every fixture talks about.
pub fn app_id() -> ApplicationId {
    ApplicationId::new("tenant", "real", "default").unwrap()
}

pub fn source_revision() -> SourceRevision {
    SourceRevision::new("repo", "branch", "bada55")
}

pub fn versions(build: u64) -> Versions {
    Versions::new(PlatformVersion::new(1, 2, 3), build)
}

pub fn run_id(job: JobType, number: u64) -> RunId {
    RunId::new(app_id(), job, number)
}

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for the run state machine types.
pub mod strategies {
    use super::*;
    use crate::certificate::TesterCertificate;
    use crate::run::{Run, RunStatus};
    use crate::step::Step;
    use proptest::prelude::*;

    pub fn arb_job_type() -> impl Strategy<Value = JobType> {
        proptest::sample::select(JobType::ALL.to_vec())
    }

    pub fn arb_run_status() -> impl Strategy<Value = RunStatus> {
        prop_oneof![
            Just(RunStatus::Running),
            Just(RunStatus::Aborted),
            Just(RunStatus::Error),
            Just(RunStatus::TestFailure),
            Just(RunStatus::DeploymentFailed),
            Just(RunStatus::InstallationFailed),
            Just(RunStatus::OutOfCapacity),
            Just(RunStatus::Success),
        ]
    }

    fn arb_outcomes() -> impl Strategy<Value = Vec<(Step, RunStatus)>> {
        proptest::collection::vec(
            (proptest::sample::select(Step::ALL.to_vec()), arb_run_status()),
            0..8,
        )
    }

    /// Runs built by replaying arbitrary valid transformations, so every
    /// generated value satisfies the run invariants.
    pub fn arb_run() -> impl Strategy<Value = Run> {
        (
            arb_job_type(),
            1..100u64,
            arb_outcomes(),
            proptest::option::of(0..50u64),
            proptest::bool::ANY,
            proptest::option::of(1_000..10_000u64),
        )
            .prop_map(|(job, number, outcomes, log_mark, with_cert, end_ms)| {
                let mut run = Run::initial(run_id(job, number), versions(number), 1_000);
                let profile = run.profile();
                for (step, status) in outcomes {
                    if profile.contains(step) {
                        run = run.with_step_status(status, step);
                    }
                }
                if let Some(mark) = log_mark {
                    run = run.with_last_test_log_entry(mark);
                }
                if with_cert {
                    let cert = TesterCertificate::new("cn", "pem", 500, 18_500_000);
                    run = run.with_tester_certificate(cert).unwrap();
                }
                if let Some(end) = end_ms {
                    run = run.aborted().finished(end).unwrap();
                }
                run
            })
    }
}
