// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixture for the scenario specs.

pub use ro_adapters::{
    ConfigServer, DeploymentId, FakeArtifactStore, FakeConfigServer, FakeMailer, FakeRouting,
    FakeTesterCloud, TesterStatus,
};
pub use ro_core::test_support::{app_id, source_revision, versions};
pub use ro_core::{
    ApplicationId, FakeClock, JobType, Notifications, PlatformVersion, Run, RunId, RunStatus,
    SourceRevision, Step, StepStatus, Versions,
};
pub use ro_engine::{
    ControllerConfig, DeploymentStepRunner, JobController, JobMaintainer, SystemKind,
};
pub use ro_storage::{MemoryLogStore, MemoryStore, RunStore};

use ro_engine::Controller;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type Jobs = JobController<
    FakeConfigServer,
    FakeTesterCloud,
    FakeRouting,
    FakeArtifactStore,
    FakeMailer,
    FakeClock,
>;

pub type Maintainer = JobMaintainer<
    FakeConfigServer,
    FakeTesterCloud,
    FakeRouting,
    FakeArtifactStore,
    FakeMailer,
    FakeClock,
>;

/// Everything a scenario needs: the controller wired to fakes.
pub struct Fixture {
    pub clock: FakeClock,
    pub store: MemoryStore,
    pub logs: MemoryLogStore,
    pub config_server: FakeConfigServer,
    pub tester: FakeTesterCloud,
    pub routing: FakeRouting,
    pub artifacts: FakeArtifactStore,
    pub mailer: FakeMailer,
    pub jobs: Jobs,
    pub maintainer: Maintainer,
}

impl Fixture {
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
        let maintainer = JobMaintainer::new(controller, runner);
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
        }
    }

    /// Register the canonical application under project 2.
    pub async fn register(&self) {
        self.jobs.register(app_id(), 2, Notifications::default()).await.unwrap();
    }

    /// Pretend earlier submissions already took the build counter to `build`.
    pub async fn seed_latest_build(&self, build: u64) {
        let mut record = self.jobs.application(&app_id()).await.unwrap().unwrap();
        record.latest_build = Some(build);
        self.store.write_application(&record).await.unwrap();
    }

    /// Submit one build with the canonical revision and author.
    pub async fn submit(&self) -> u64 {
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

    pub fn real_deployment(&self, job: JobType) -> DeploymentId {
        DeploymentId::new(app_id(), job.zone())
    }

    pub fn tester_deployment(&self, job: JobType) -> DeploymentId {
        DeploymentId::new(app_id().tester().id().clone(), job.zone())
    }

    pub async fn statuses(&self, job: JobType) -> BTreeMap<Step, StepStatus> {
        self.jobs.last(&app_id(), job).await.unwrap().unwrap().steps().clone()
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

    /// Tick until a pass changes nothing, bounded to keep specs finite.
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

    /// Tick until the given step of the job's active run has resolved.
    pub async fn run_until_step_done(&self, job: JobType, step: Step) {
        for _ in 0..32 {
            if let Some(run) = self.jobs.active(&app_id(), job).await.unwrap() {
                if run.step_status(step).is_some_and(|s| s != StepStatus::Unfinished) {
                    return;
                }
            }
            self.maintainer.tick().await;
        }
        panic!("step {step} of {job} did not resolve within 32 ticks");
    }
}
