// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::controller::JobController;
use crate::maintainer::JobMaintainer;
use crate::runner::DeploymentStepRunner;
use crate::{Controller, ControllerConfig, SystemKind};
use ro_adapters::{
    DeploymentId, FakeArtifactStore, FakeConfigServer, FakeMailer, FakeRouting,
    FakeTesterCloud,
};
use ro_core::test_support::{app_id, source_revision, versions};
use ro_core::{ApplicationId, FakeClock, JobType, Notifications, Run, RunId, Versions};
use ro_storage::{MemoryLogStore, MemoryStore};
use std::collections::BTreeMap;
use std::sync::Arc;

pub(crate) type TestController = Controller<
    FakeConfigServer,
    FakeTesterCloud,
    FakeRouting,
    FakeArtifactStore,
    FakeMailer,
    FakeClock,
>;

pub(crate) struct Harness {
    pub clock: FakeClock,
    pub store: MemoryStore,
    pub logs: MemoryLogStore,
    pub config_server: FakeConfigServer,
    pub tester: FakeTesterCloud,
    pub routing: FakeRouting,
    pub artifacts: FakeArtifactStore,
    pub mailer: FakeMailer,
    pub jobs: JobController<
        FakeConfigServer,
        FakeTesterCloud,
        FakeRouting,
        FakeArtifactStore,
        FakeMailer,
        FakeClock,
    >,
    pub maintainer: JobMaintainer<
        FakeConfigServer,
        FakeTesterCloud,
        FakeRouting,
        FakeArtifactStore,
        FakeMailer,
        FakeClock,
    >,
    pub controller: Arc<TestController>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ControllerConfig::default().system(SystemKind::Public))
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        let clock = FakeClock::new();
        let store = MemoryStore::new();
        let logs = MemoryLogStore::new();
        let config_server = FakeConfigServer::new(clock.clone());
        let tester = FakeTesterCloud::new();
        let routing = FakeRouting::new();
        let artifacts = FakeArtifactStore::new();
        let mailer = FakeMailer::new();
        let controller = Controller::new(
            config,
            clock.clone(),
            Arc::new(store.clone()),
            Arc::new(logs.clone()),
            config_server.clone(),
            tester.clone(),
            routing.clone(),
            artifacts.clone(),
            mailer.clone(),
        );
        let jobs = JobController::new(controller.clone());
        let runner = Arc::new(DeploymentStepRunner::new(jobs.clone()));
        let maintainer = JobMaintainer::new(controller.clone(), runner);
        Self {
            clock,
            store,
            logs,
            config_server,
            tester,
            routing,
            artifacts,
            mailer,
            jobs,
            maintainer,
            controller,
        }
    }

    pub fn app(&self) -> ApplicationId {
        app_id()
    }

    pub async fn register(&self) {
        self.jobs.register(app_id(), 2, Notifications::default()).await.unwrap();
    }

    /// Register and submit one build; returns its build number.
    pub async fn submit(&self) -> u64 {
        self.register().await;
        self.jobs
            .submit(
                &app_id(),
                source_revision(),
                Some("a@b".to_string()),
                2,
                b"application package".to_vec(),
                b"test package".to_vec(),
            )
            .await
            .unwrap()
            .build_number
    }

    /// Register, submit, and start a run of `job` targeting the new build.
    pub async fn submit_and_start(&self, job: JobType) -> RunId {
        let build = self.submit().await;
        self.jobs.start(&app_id(), job, versions(build)).await.unwrap()
    }

    pub async fn start(&self, job: JobType, v: Versions) -> RunId {
        self.jobs.start(&app_id(), job, v).await.unwrap()
    }

    pub fn real_deployment(&self, job: JobType) -> DeploymentId {
        DeploymentId::new(app_id(), job.zone())
    }

    pub fn tester_deployment(&self, job: JobType) -> DeploymentId {
        DeploymentId::new(app_id().tester().id().clone(), job.zone())
    }

    async fn snapshot(&self) -> Vec<(JobType, Option<Run>, BTreeMap<u64, Run>)> {
        let mut all = Vec::new();
        for job in JobType::ALL {
            let active = self.jobs.active(&app_id(), job).await.unwrap();
            let runs = self.jobs.runs(&app_id(), job).await.unwrap();
            all.push((job, active, runs));
        }
        all
    }

    /// Tick until a pass changes nothing, bounded to keep tests finite.
    pub async fn run_until_idle(&self) {
        for _ in 0..32 {
            let before = self.snapshot().await;
            self.maintainer.tick().await;
            if self.snapshot().await == before {
                return;
            }
        }
        panic!("maintainer did not go idle within 32 ticks");
    }
}
