// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Whole-run timeout handling.

use super::prelude::*;
use std::time::Duration;

/// A run stuck past the job timeout is aborted on the next tick.
#[tokio::test]
async fn stuck_runs_are_aborted_after_the_job_timeout() {
    let fixture = Fixture::new();
    fixture.register().await;
    let build = fixture.submit().await;
    fixture
        .jobs
        .start(&app_id(), JobType::SystemTest, versions(build))
        .await
        .unwrap();

    // the installations never converge
    fixture.config_server.set_auto_converge(false);
    fixture.maintainer.tick().await;
    fixture.maintainer.tick().await;
    let run = fixture.jobs.last(&app_id(), JobType::SystemTest).await.unwrap().unwrap();
    assert_eq!(run.status(), RunStatus::Running);

    fixture.clock.advance(Duration::from_millis(24 * 60 * 60 * 1000 + 1_000));
    fixture.maintainer.tick().await;
    let run = fixture.jobs.last(&app_id(), JobType::SystemTest).await.unwrap().unwrap();
    assert_eq!(run.status(), RunStatus::Aborted);

    // cleanup still drains and the run ends
    fixture.run_until_idle().await;
    let run = fixture.jobs.last(&app_id(), JobType::SystemTest).await.unwrap().unwrap();
    assert!(run.has_ended());
    assert_eq!(run.status(), RunStatus::Aborted);
}
