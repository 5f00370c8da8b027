// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! History bounds.

use super::prelude::*;

/// After 257 completed runs only the newest 256 remain, and the evicted
/// run's details are gone.
#[tokio::test]
async fn history_is_pruned_at_its_length_bound() {
    let fixture = Fixture::new();
    fixture.register().await;

    for expected in 1..=257u64 {
        let id = fixture
            .jobs
            .deploy(&app_id(), JobType::DevUsEast1, None, b"package".to_vec())
            .await
            .unwrap();
        assert_eq!(id.number(), expected);
        fixture.run_until_idle().await;
        let run = fixture.jobs.last(&app_id(), JobType::DevUsEast1).await.unwrap().unwrap();
        assert!(run.has_ended(), "run {expected} should have completed");
        assert_eq!(run.status(), RunStatus::Success);
    }

    let runs = fixture.jobs.runs(&app_id(), JobType::DevUsEast1).await.unwrap();
    assert_eq!(runs.len(), 256);
    assert!(!runs.contains_key(&1));
    assert!(runs.contains_key(&257));

    let evicted = RunId::new(app_id(), JobType::DevUsEast1, 1);
    assert!(fixture.jobs.details(&evicted).await.unwrap().is_none());
    let newest = RunId::new(app_id(), JobType::DevUsEast1, 257);
    assert!(fixture.jobs.details(&newest).await.unwrap().is_some());
}
