// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::job::JobType;

#[test]
fn prerequisite_relation_is_acyclic() {
    // all_prerequisites terminates only on a DAG; a step reachable from
    // itself would also show up in its own closure.
    for step in Step::ALL {
        assert!(
            !step.all_prerequisites().contains(&step),
            "{step} is its own prerequisite"
        );
    }
}

#[test]
fn transitive_closure_reaches_roots() {
    let closure = Step::Report.all_prerequisites();
    assert!(closure.contains(&Step::DeployTester));
    assert!(closure.contains(&Step::DeployInitialReal));
    assert!(closure.contains(&Step::DeactivateReal));
    assert!(closure.contains(&Step::DeactivateTester));
}

#[test]
fn start_tests_needs_both_installs() {
    let closure = Step::StartTests.all_prerequisites();
    assert!(closure.contains(&Step::InstallReal));
    assert!(closure.contains(&Step::InstallTester));
    assert!(!closure.contains(&Step::EndTests));
}

#[yare::parameterized(
    system_test = { JobType::SystemTest,        10, 4 },
    staging     = { JobType::StagingTest,       12, 4 },
    production  = { JobType::ProductionUsEast3, 3,  1 },
    dev         = { JobType::DevUsEast1,        2,  0 },
)]
fn profile_sizes(job: JobType, steps: usize, always_run: usize) {
    let profile = JobProfile::of(job);
    assert_eq!(profile.steps().len(), steps);
    assert_eq!(profile.always_run().len(), always_run);
}

#[test]
fn always_run_steps_are_profile_members() {
    for job in JobType::ALL {
        let profile = JobProfile::of(job);
        for &step in profile.always_run() {
            assert!(profile.contains(step), "{job}: {step} always-run but not in profile");
        }
    }
}

#[test]
fn system_test_skips_initial_deployment_pair() {
    let profile = JobProfile::of(JobType::SystemTest);
    assert!(!profile.contains(Step::DeployInitialReal));
    assert!(!profile.contains(Step::InstallInitialReal));
    // deploy-real's only prerequisites lie outside the profile, so it
    // gates on nothing and can start right away.
    assert!(profile.prerequisites_of(Step::DeployReal).is_empty());
}

#[test]
fn staging_test_stages_through_initial_deployment() {
    let profile = JobProfile::of(JobType::StagingTest);
    assert_eq!(
        profile.prerequisites_of(Step::DeployReal),
        vec![Step::DeployInitialReal, Step::InstallInitialReal]
    );
}

#[test]
fn production_report_gates_on_install() {
    // report's declared prerequisites are cleanup steps, none of which
    // production runs; the transitive closure lands on install-real.
    let profile = JobProfile::of(JobType::ProductionUsEast3);
    let prerequisites = profile.prerequisites_of(Step::Report);
    assert!(prerequisites.contains(&Step::DeployReal));
    assert!(prerequisites.contains(&Step::InstallReal));
    assert_eq!(prerequisites.len(), 2);
}

#[test]
fn step_serde_uses_kebab_case() {
    assert_eq!(serde_json::to_string(&Step::CopyLogs).unwrap(), "\"copy-logs\"");
    assert_eq!(
        serde_json::from_str::<Step>("\"deactivate-tester\"").unwrap(),
        Step::DeactivateTester
    );
}
