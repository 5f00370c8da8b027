// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Garbage collection liveness.

use super::prelude::*;
use ro_storage::LockKey;

/// After unregistering, repeated collection eventually destroys all run
/// data, provided no step lock is permanently held.
#[tokio::test]
async fn unregistered_applications_are_eventually_collected() {
    let fixture = Fixture::new();
    fixture.register().await;
    let build = fixture.submit().await;
    fixture
        .jobs
        .start(&app_id(), JobType::SystemTest, versions(build))
        .await
        .unwrap();
    fixture.maintainer.tick().await;

    fixture.jobs.unregister(&app_id()).await.unwrap();

    for _ in 0..32 {
        fixture.maintainer.tick().await;
        fixture.jobs.collect_garbage().await.unwrap();
        if fixture.jobs.last(&app_id(), JobType::SystemTest).await.unwrap().is_none() {
            break;
        }
    }

    for job in JobType::ALL {
        assert!(fixture.jobs.last(&app_id(), job).await.unwrap().is_none(), "{job}");
    }
    assert!(fixture.store.applications_with_jobs().await.unwrap().is_empty());
    assert!(fixture.jobs.application(&app_id()).await.unwrap().is_none());
}

/// A held step lock defers collection without losing liveness.
#[tokio::test]
async fn collection_waits_for_in_flight_steps() {
    let fixture = Fixture::new();
    fixture.register().await;
    let build = fixture.submit().await;
    fixture
        .jobs
        .start(&app_id(), JobType::SystemTest, versions(build))
        .await
        .unwrap();
    fixture.jobs.unregister(&app_id()).await.unwrap();
    fixture.run_until_idle().await;

    let lease = fixture
        .store
        .try_lock(&LockKey::Step(app_id(), JobType::SystemTest, Step::EndTests))
        .unwrap();
    fixture.jobs.collect_garbage().await.unwrap();
    assert!(fixture.jobs.last(&app_id(), JobType::SystemTest).await.unwrap().is_some());

    drop(lease);
    fixture.jobs.collect_garbage().await.unwrap();
    assert!(fixture.jobs.last(&app_id(), JobType::SystemTest).await.unwrap().is_none());
}
