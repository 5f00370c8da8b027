// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Full-pipeline deployment scenarios.

use super::prelude::*;

/// A submitted system test advances wave by wave and ends in success.
#[tokio::test]
async fn happy_path_system_test() {
    let fixture = Fixture::new();
    fixture.register().await;
    fixture.seed_latest_build(320).await;
    let build = fixture.submit().await;
    assert_eq!(build, 321);

    fixture
        .jobs
        .start(&app_id(), JobType::SystemTest, versions(build))
        .await
        .unwrap();

    // first wave: both deployments
    fixture.maintainer.tick().await;
    let statuses = fixture.statuses(JobType::SystemTest).await;
    assert_eq!(statuses[&Step::DeployTester], StepStatus::Succeeded);
    assert_eq!(statuses[&Step::DeployReal], StepStatus::Succeeded);
    assert_eq!(statuses[&Step::InstallTester], StepStatus::Unfinished);

    // second wave: both installations
    fixture.maintainer.tick().await;
    let statuses = fixture.statuses(JobType::SystemTest).await;
    assert_eq!(statuses[&Step::InstallTester], StepStatus::Succeeded);
    assert_eq!(statuses[&Step::InstallReal], StepStatus::Succeeded);

    // tests start, then report running until the tester is done
    fixture.run_until_step_done(JobType::SystemTest, Step::StartTests).await;
    fixture.maintainer.tick().await;
    let statuses = fixture.statuses(JobType::SystemTest).await;
    assert_eq!(statuses[&Step::EndTests], StepStatus::Unfinished);

    fixture.tester.set_status(TesterStatus::Success);
    fixture.run_until_idle().await;

    let run = fixture.jobs.last(&app_id(), JobType::SystemTest).await.unwrap().unwrap();
    assert!(run.steps().values().all(|status| *status == StepStatus::Succeeded));
    assert_eq!(run.status(), RunStatus::Success);
    assert!(run.has_ended());
    assert_eq!(run.id().number(), 1);
    assert_eq!(run.versions().target_platform(), PlatformVersion::new(1, 2, 3));
    assert_eq!(run.versions().target_application(), 321);

    // both deployments were taken down again on the way out
    assert!(!fixture
        .config_server
        .has_deployment(&fixture.real_deployment(JobType::SystemTest)));
    assert!(!fixture
        .config_server
        .has_deployment(&fixture.tester_deployment(JobType::SystemTest)));
}

/// A failing start-tests step fails the staging run, and only cleanup steps
/// run afterwards.
#[tokio::test]
async fn staging_run_fails_when_tests_cannot_start() {
    let fixture = Fixture::new();
    fixture.register().await;
    let build = fixture.submit().await;
    fixture
        .jobs
        .start(&app_id(), JobType::StagingTest, versions(build))
        .await
        .unwrap();

    fixture.tester.fail_next_start();
    fixture.run_until_idle().await;

    let run = fixture.jobs.last(&app_id(), JobType::StagingTest).await.unwrap().unwrap();
    assert_eq!(run.step_status(Step::StartTests), Some(StepStatus::Failed));
    assert_eq!(run.status(), RunStatus::Error);
    assert!(run.has_ended());

    // the stage was set first
    assert_eq!(run.step_status(Step::DeployInitialReal), Some(StepStatus::Succeeded));
    assert_eq!(run.step_status(Step::InstallInitialReal), Some(StepStatus::Succeeded));

    // cleanup ran to completion; the step after the failure never did
    assert_eq!(run.step_status(Step::EndTests), Some(StepStatus::Unfinished));
    for step in [Step::CopyLogs, Step::DeactivateReal, Step::DeactivateTester, Step::Report] {
        assert_eq!(run.step_status(step), Some(StepStatus::Succeeded), "{step}");
    }
}

/// A second start of the same job is rejected while the first is active.
#[tokio::test]
async fn double_start_is_rejected() {
    let fixture = Fixture::new();
    fixture.register().await;
    let build = fixture.submit().await;

    fixture
        .jobs
        .start(&app_id(), JobType::SystemTest, versions(build))
        .await
        .unwrap();
    let second = fixture.jobs.start(&app_id(), JobType::SystemTest, versions(build)).await;
    assert!(second.is_err());

    // a different job type is accepted
    fixture
        .jobs
        .start(&app_id(), JobType::StagingTest, versions(build))
        .await
        .unwrap();
}

/// Deactivating the deployment externally fails the installing run.
#[tokio::test]
async fn deployment_vanishing_mid_install_fails_the_run() {
    let fixture = Fixture::new();
    fixture.register().await;
    let build = fixture.submit().await;
    fixture
        .jobs
        .start(&app_id(), JobType::SystemTest, versions(build))
        .await
        .unwrap();

    fixture.config_server.set_auto_converge(false);
    fixture.maintainer.tick().await; // deployments
    fixture.maintainer.tick().await; // installations now wait

    let statuses = fixture.statuses(JobType::SystemTest).await;
    assert_eq!(statuses[&Step::InstallReal], StepStatus::Unfinished);

    // someone deactivates the application out-of-band
    fixture
        .config_server
        .deactivate(&fixture.real_deployment(JobType::SystemTest))
        .await
        .unwrap();

    fixture.run_until_idle().await;
    let run = fixture.jobs.last(&app_id(), JobType::SystemTest).await.unwrap().unwrap();
    assert_eq!(run.step_status(Step::InstallTester), Some(StepStatus::Failed));
    assert!(run.has_failed());
    assert!(run.has_ended());
}
