// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run serialisation: a fixed snapshot, and round-trips through the store.

use super::prelude::*;
use ro_core::TesterCertificate;

const PEM: &str = "-----BEGIN CERTIFICATE-----\nMIIBtestcertificatebody\n-----END CERTIFICATE-----\n";

/// The canonical persisted form of a mid-flight staging run.
const SNAPSHOT: &str = r#"{
  "id": {
    "application": { "tenant": "tenant", "application": "real", "instance": "default" },
    "job_type": "staging-test",
    "number": 3
  },
  "versions": {
    "target_platform": "1.2.3",
    "target_application": 321,
    "source_platform": "1.2.2",
    "source_application": 320
  },
  "start_ms": 1000000,
  "status": "running",
  "steps": {
    "deploy-tester": "succeeded",
    "install-tester": "succeeded",
    "deploy-initial-real": "succeeded",
    "install-initial-real": "succeeded",
    "deploy-real": "succeeded",
    "install-real": "succeeded",
    "start-tests": "succeeded",
    "end-tests": "unfinished",
    "copy-logs": "unfinished",
    "deactivate-real": "unfinished",
    "deactivate-tester": "unfinished",
    "report": "unfinished"
  },
  "last_test_log_entry": 3,
  "tester_certificate": {
    "common_name": "tenant.real.default-t.staging-test.3",
    "pem": "-----BEGIN CERTIFICATE-----\nMIIBtestcertificatebody\n-----END CERTIFICATE-----\n",
    "not_before_ms": 1000000,
    "not_after_ms": 19000000
  }
}"#;

fn snapshot_run() -> Run {
    let id = RunId::new(app_id(), JobType::StagingTest, 3);
    let versions = Versions::new(PlatformVersion::new(1, 2, 3), 321)
        .with_source(PlatformVersion::new(1, 2, 2), 320);
    let mut run = Run::initial(id, versions, 1_000_000);
    for step in [
        Step::DeployTester,
        Step::InstallTester,
        Step::DeployInitialReal,
        Step::InstallInitialReal,
        Step::DeployReal,
        Step::InstallReal,
        Step::StartTests,
    ] {
        run = run.with_step_status(RunStatus::Running, step);
    }
    run = run.with_last_test_log_entry(3);
    run.with_tester_certificate(TesterCertificate::new(
        "tenant.real.default-t.staging-test.3",
        PEM,
        1_000_000,
        19_000_000,
    ))
    .unwrap()
}

#[test]
fn snapshot_deserializes_to_the_expected_run() {
    let parsed: Run = serde_json::from_str(SNAPSHOT).unwrap();

    assert_eq!(parsed.id().job_type(), JobType::StagingTest);
    assert_eq!(parsed.id().number(), 3);
    assert_eq!(parsed.steps().len(), 12);
    assert_eq!(parsed.step_status(Step::StartTests), Some(StepStatus::Succeeded));
    assert_eq!(parsed.step_status(Step::EndTests), Some(StepStatus::Unfinished));
    assert_eq!(parsed.status(), RunStatus::Running);
    assert_eq!(parsed.last_test_log_entry(), 3);
    assert_eq!(parsed.versions().target_platform(), PlatformVersion::new(1, 2, 3));
    assert_eq!(parsed.versions().source_application(), Some(320));
    assert_eq!(parsed.tester_certificate().unwrap().pem(), PEM);
    assert!(!parsed.has_ended());

    assert_eq!(parsed, snapshot_run());
}

#[test]
fn snapshot_survives_mutation_and_rewriting() {
    let parsed: Run = serde_json::from_str(SNAPSHOT).unwrap();
    let mutated = parsed.with_step_status(RunStatus::Running, Step::EndTests);

    let json = serde_json::to_string(&mutated).unwrap();
    let reread: Run = serde_json::from_str(&json).unwrap();
    assert_eq!(reread, mutated);
    assert_eq!(reread.step_status(Step::EndTests), Some(StepStatus::Succeeded));
}

#[tokio::test]
async fn runs_round_trip_through_the_store() {
    let fixture = Fixture::new();
    let run = snapshot_run();

    fixture.store.write_last_run(&run).await.unwrap();
    let read = fixture
        .store
        .read_last_run(&app_id(), JobType::StagingTest)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read, run);

    // finished runs round-trip through history documents as well
    let finished = read.aborted().finished(2_000_000).unwrap();
    let mut history = std::collections::BTreeMap::new();
    history.insert(finished.id().number(), finished.clone());
    fixture
        .store
        .write_historic_runs(&app_id(), JobType::StagingTest, &history)
        .await
        .unwrap();
    let reread = fixture
        .store
        .read_historic_runs(&app_id(), JobType::StagingTest)
        .await
        .unwrap();
    assert_eq!(reread.get(&3), Some(&finished));
}
