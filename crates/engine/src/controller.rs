// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job controller: run lifecycle, submission, history, and locking.
//!
//! Locks are taken application before job before step. The one sanctioned
//! inversion is [`JobController::lock_step`] briefly latching prerequisite
//! step locks while holding its own step lock; the application lock is never
//! taken while a step lock is held.

use crate::error::ControllerError;
use crate::Controller;
use ro_adapters::{
    ArtifactStore, ConfigServer, DeploymentId, Mailer, PackageKind, Routing, TesterCloud,
};
use ro_core::{
    ApplicationId, ApplicationRecord, ApplicationVersion, Clock, JobProfile, JobType, LogEntry,
    LogLevel, Notifications, PlatformVersion, Run, RunError, RunId, RunStatus, SourceRevision,
    Step, Versions,
};
use ro_storage::{Lease, LockKey, LogStore, RunLog, RunStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Finished runs kept per job, beyond which the oldest are evicted.
pub const HISTORY_LENGTH: u64 = 256;

/// Finished runs older than this are evicted regardless of count.
pub const MAX_HISTORY_AGE_MS: u64 = 60 * 24 * 60 * 60 * 1000;

/// Proof that the holder owns one step's lock.
///
/// Only [`JobController::lock_step`] mints these, after observing every
/// prerequisite step idle.
pub struct LockedStep {
    step: Step,
    _lease: Lease,
}

impl LockedStep {
    pub fn step(&self) -> Step {
        self.step
    }
}

/// Public façade over the run registry. Cheap to clone; all clones share
/// the same [`Controller`] bundle.
pub struct JobController<C, T, R, A, M, K> {
    inner: Arc<Controller<C, T, R, A, M, K>>,
}

impl<C, T, R, A, M, K> Clone for JobController<C, T, R, A, M, K> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<C, T, R, A, M, K> JobController<C, T, R, A, M, K>
where
    C: ConfigServer,
    T: TesterCloud,
    R: Routing,
    A: ArtifactStore,
    M: Mailer,
    K: Clock,
{
    pub fn new(inner: Arc<Controller<C, T, R, A, M, K>>) -> Self {
        Self { inner }
    }

    pub fn controller(&self) -> &Controller<C, T, R, A, M, K> {
        &self.inner
    }

    fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.inner.config().lock_timeout_ms)
    }

    fn now_ms(&self) -> u64 {
        self.inner.clock().now_ms()
    }

    // ── registry ─────────────────────────────────────────────────────────

    /// Create or re-register an application.
    pub async fn register(
        &self,
        id: ApplicationId,
        project_id: u64,
        notifications: Notifications,
    ) -> Result<(), ControllerError> {
        let store = self.inner.store();
        let _lease = store.lock(&LockKey::Application(id.clone()), self.lock_timeout()).await?;
        let mut record = store
            .read_application(&id)
            .await?
            .unwrap_or_else(|| ApplicationRecord::new(id.clone(), project_id));
        record.registered = true;
        record.project_id = project_id;
        record.notifications = notifications;
        store.write_application(&record).await?;
        Ok(())
    }

    pub async fn application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, ControllerError> {
        Ok(self.inner.store().read_application(id).await?)
    }

    /// Accept a new submission: assign the next build number, store both
    /// packages, prune packages below the production horizon, and mark the
    /// application internally deployed.
    pub async fn submit(
        &self,
        id: &ApplicationId,
        source: SourceRevision,
        author_email: Option<String>,
        project_id: u64,
        application_package: Vec<u8>,
        test_package: Vec<u8>,
    ) -> Result<ApplicationVersion, ControllerError> {
        let store = self.inner.store();
        let _lease = store.lock(&LockKey::Application(id.clone()), self.lock_timeout()).await?;
        let mut record = store
            .read_application(id)
            .await?
            .ok_or_else(|| ControllerError::ApplicationNotFound(id.clone()))?;

        let build = record.latest_build.unwrap_or(0) + 1;
        let mut version = ApplicationVersion::new(source, build);
        if let Some(author) = author_email {
            version = version.author_email(author);
        }

        let artifacts = self.inner.artifacts();
        artifacts.put(id, build, PackageKind::Application, application_package).await?;
        artifacts.put(id, build, PackageKind::Tests, test_package).await?;
        if let Some(oldest) = record.oldest_deployed_production_build() {
            artifacts.prune(id, oldest).await?;
        }

        record.latest_build = Some(build);
        record.versions.push(version.clone());
        record.registered = true;
        record.project_id = project_id;
        store.write_application(&record).await?;

        tracing::info!(application = %id, build, "accepted submission; notifying deployment triggering");
        Ok(version)
    }

    // ── run lifecycle ────────────────────────────────────────────────────

    /// Start a fresh run of `job` for the application.
    pub async fn start(
        &self,
        id: &ApplicationId,
        job: JobType,
        versions: Versions,
    ) -> Result<RunId, ControllerError> {
        let store = self.inner.store();
        let _lease =
            store.lock(&LockKey::Job(id.clone(), job), self.lock_timeout()).await?;

        let last = store.read_last_run(id, job).await?;
        if last.as_ref().is_some_and(|run| !run.has_ended()) {
            return Err(ControllerError::AlreadyRunning(id.clone(), job));
        }
        if !job.is_manually_deployed() {
            let known = store
                .read_application(id)
                .await?
                .is_some_and(|record| record.version(versions.target_application()).is_some());
            if !known {
                return Err(ControllerError::InvalidVersions {
                    application: id.clone(),
                    build: versions.target_application(),
                });
            }
        }

        let history = store.read_historic_runs(id, job).await?;
        let previous = last
            .map(|run| run.id().number())
            .into_iter()
            .chain(history.keys().next_back().copied())
            .max()
            .unwrap_or(0);
        let run = Run::initial(RunId::new(id.clone(), job, previous + 1), versions, self.now_ms());
        store.write_last_run(&run).await?;
        tracing::info!(run = %run.id(), "started run");
        Ok(run.id().clone())
    }

    /// Deploy a package directly to a manually deployed job, replacing any
    /// run already going there, and kick the maintainer.
    pub async fn deploy(
        &self,
        id: &ApplicationId,
        job: JobType,
        platform: Option<PlatformVersion>,
        package: Vec<u8>,
    ) -> Result<RunId, ControllerError> {
        if !job.is_manually_deployed() {
            return Err(ControllerError::NotManuallyDeployed(job));
        }

        let store = self.inner.store();
        {
            let _lease =
                store.lock(&LockKey::Job(id.clone(), job), self.lock_timeout()).await?;
            if let Some(last) = store.read_last_run(id, job).await? {
                if !last.has_ended() {
                    // manual profiles have no cleanup steps, so the aborted
                    // run can be sealed right here
                    tracing::info!(run = %last.id(), "replacing active manual run");
                    let aborted = last.aborted();
                    store.write_last_run(&aborted).await?;
                    self.finish_locked(aborted).await?;
                }
            }
        }

        self.inner.artifacts().put_dev(id, &job.zone(), package).await?;
        let build = store
            .read_application(id)
            .await?
            .and_then(|record| record.latest_build)
            .unwrap_or(0);
        let platform = platform.unwrap_or(self.inner.config().default_platform);
        let run_id = self.start(id, job, Versions::new(platform, build)).await?;
        self.inner.wake().notify_one();
        Ok(run_id)
    }

    /// Mark the run aborted. Idempotent; a terminal failure is preserved.
    pub async fn abort(&self, id: &RunId, reason: &str) -> Result<(), ControllerError> {
        let updated = self.locked(id, |run| Ok(run.aborted())).await?;
        if updated.is_some() {
            tracing::info!(run = %id, reason, "aborted run");
        }
        Ok(())
    }

    /// Soft removal: the application stops being internally deployed and its
    /// active runs abort, but run data survives until [`Self::collect_garbage`]
    /// can prove no step is executing.
    pub async fn unregister(&self, id: &ApplicationId) -> Result<(), ControllerError> {
        let store = self.inner.store();
        {
            let _lease =
                store.lock(&LockKey::Application(id.clone()), self.lock_timeout()).await?;
            if let Some(mut record) = store.read_application(id).await? {
                record.registered = false;
                store.write_application(&record).await?;
            }
        }
        for job in JobType::ALL {
            if let Some(run) = self.active(id, job).await? {
                self.abort(run.id(), "application unregistered").await?;
            }
        }
        tracing::info!(application = %id, "unregistered application");
        Ok(())
    }

    /// Destroy run data of applications no longer registered. An application
    /// is skipped whenever one of its step locks is unavailable; the next
    /// cycle retries.
    pub async fn collect_garbage(&self) -> Result<(), ControllerError> {
        let store = self.inner.store();
        for id in store.applications_with_jobs().await? {
            let registered =
                store.read_application(&id).await?.is_some_and(|record| record.registered);
            if registered {
                continue;
            }

            let mut leases = Vec::new();
            let mut busy = None;
            'jobs: for job in JobType::ALL {
                for &step in JobProfile::of(job).steps() {
                    match store.try_lock(&LockKey::Step(id.clone(), job, step)) {
                        Ok(lease) => leases.push(lease),
                        Err(_) => {
                            busy = Some((job, step));
                            break 'jobs;
                        }
                    }
                }
            }
            if let Some((job, step)) = busy {
                tracing::info!(
                    application = %id, job = %job, step = %step,
                    "step still executing; deferring garbage collection"
                );
                continue;
            }

            for job in [JobType::SystemTest, JobType::StagingTest] {
                let tester = DeploymentId::new(id.tester().id().clone(), job.zone());
                if let Err(error) = self.inner.config_server().deactivate(&tester).await {
                    tracing::warn!(deployment = %tester, error = %error, "tester deactivation failed");
                }
            }
            self.inner.logs().delete_application(&id).await?;
            store.delete_run_data(&id, None).await?;
            store.remove_application(&id).await?;
            tracing::info!(application = %id, "collected unregistered application");
        }
        Ok(())
    }

    // ── logs ─────────────────────────────────────────────────────────────

    pub async fn append_log(
        &self,
        id: &RunId,
        step: Step,
        level: LogLevel,
        message: impl Into<String>,
    ) -> Result<(), ControllerError> {
        let entry = LogEntry::new(0, self.now_ms(), level, message);
        Ok(self.inner.logs().append(id, step, vec![entry]).await?)
    }

    pub async fn append_entries(
        &self,
        id: &RunId,
        step: Step,
        entries: Vec<LogEntry>,
    ) -> Result<(), ControllerError> {
        Ok(self.inner.logs().append(id, step, entries).await?)
    }

    /// Pull new test log entries from the tester cloud and advance the run's
    /// high-water mark.
    pub async fn update_test_log(&self, id: &RunId) -> Result<(), ControllerError> {
        let Some(run) = self.active(id.application(), id.job_type()).await? else {
            return Ok(());
        };
        if run.id() != id {
            return Ok(());
        }
        let Some(url) = self.tester_url(id.application(), id.job_type()).await else {
            return Ok(());
        };
        let entries = self.inner.tester().log(&url, run.last_test_log_entry()).await?;
        let Some(newest) = entries.iter().map(|entry| entry.id).max() else {
            return Ok(());
        };
        self.inner.logs().append(id, Step::EndTests, entries).await?;
        self.locked(id, |run| Ok(run.with_last_test_log_entry(newest))).await?;
        Ok(())
    }

    /// The tester's endpoint for this job, once routing has discovered it.
    pub async fn tester_url(&self, id: &ApplicationId, job: JobType) -> Option<String> {
        let deployment = DeploymentId::new(id.tester().id().clone(), job.zone());
        self.inner.routing().cluster_endpoints(&deployment).await.into_values().next()
    }

    // ── queries ──────────────────────────────────────────────────────────

    /// The most recent run, active or finished.
    pub async fn last(
        &self,
        id: &ApplicationId,
        job: JobType,
    ) -> Result<Option<Run>, ControllerError> {
        let store = self.inner.store();
        if let Some(run) = store.read_last_run(id, job).await? {
            return Ok(Some(run));
        }
        Ok(store.read_historic_runs(id, job).await?.into_values().next_back())
    }

    /// The active run, if one exists.
    pub async fn active(
        &self,
        id: &ApplicationId,
        job: JobType,
    ) -> Result<Option<Run>, ControllerError> {
        Ok(self.inner.store().read_last_run(id, job).await?.filter(|run| !run.has_ended()))
    }

    /// Every active run across all applications and jobs.
    pub async fn active_runs(&self) -> Result<Vec<Run>, ControllerError> {
        let mut runs = Vec::new();
        for id in self.inner.store().applications_with_jobs().await? {
            for job in JobType::ALL {
                if let Some(run) = self.active(&id, job).await? {
                    runs.push(run);
                }
            }
        }
        Ok(runs)
    }

    /// All known runs of a job, keyed by number.
    pub async fn runs(
        &self,
        id: &ApplicationId,
        job: JobType,
    ) -> Result<BTreeMap<u64, Run>, ControllerError> {
        let store = self.inner.store();
        let mut runs = store.read_historic_runs(id, job).await?;
        if let Some(last) = store.read_last_run(id, job).await? {
            runs.insert(last.id().number(), last);
        }
        Ok(runs)
    }

    /// One run and its log.
    pub async fn details(
        &self,
        id: &RunId,
    ) -> Result<Option<(Run, RunLog)>, ControllerError> {
        let Some(run) =
            self.runs(id.application(), id.job_type()).await?.remove(&id.number())
        else {
            return Ok(None);
        };
        let logs = self.inner.logs();
        let log = if run.has_ended() {
            logs.read_finished(id, 0).await?.unwrap_or_default()
        } else {
            logs.read_active(id, 0).await?
        };
        Ok(Some((run, log)))
    }

    // ── locking ──────────────────────────────────────────────────────────

    /// Read-modify-write the active run under its lock. No-op (returning
    /// `None`) when the run has ended or been superseded.
    pub async fn locked<F>(&self, id: &RunId, f: F) -> Result<Option<Run>, ControllerError>
    where
        F: FnOnce(Run) -> Result<Run, RunError> + Send,
    {
        let store = self.inner.store();
        let _lease = store
            .lock(
                &LockKey::Job(id.application().clone(), id.job_type()),
                self.lock_timeout(),
            )
            .await?;
        let Some(run) = store.read_last_run(id.application(), id.job_type()).await? else {
            return Ok(None);
        };
        if run.id() != id || run.has_ended() {
            return Ok(None);
        }
        let updated = f(run)?;
        store.write_last_run(&updated).await?;
        Ok(Some(updated))
    }

    /// Take the step lock, then briefly latch each profile prerequisite to
    /// confirm no predecessor is executing. Times out as
    /// [`ro_storage::StoreError::LockTimeout`].
    pub async fn lock_step(
        &self,
        id: &ApplicationId,
        job: JobType,
        step: Step,
    ) -> Result<LockedStep, ControllerError> {
        let store = self.inner.store();
        let lease = store
            .lock(
                &LockKey::Step(id.clone(), job, step),
                Duration::from_millis(self.inner.config().step_lock_timeout_ms),
            )
            .await?;
        let latch_timeout =
            Duration::from_millis(self.inner.config().prerequisite_latch_timeout_ms);
        for prerequisite in JobProfile::of(job).prerequisites_of(step) {
            let latch = store
                .lock(&LockKey::Step(id.clone(), job, prerequisite), latch_timeout)
                .await?;
            drop(latch);
        }
        Ok(LockedStep { step, _lease: lease })
    }

    // ── finishing and history ────────────────────────────────────────────

    /// Seal the active run, move it from "last" into history, and evict
    /// history beyond the count and age bounds.
    pub async fn finish(&self, id: &RunId) -> Result<(), ControllerError> {
        let store = self.inner.store();
        let production_build;
        {
            let _lease = store
                .lock(
                    &LockKey::Job(id.application().clone(), id.job_type()),
                    self.lock_timeout(),
                )
                .await?;
            let Some(run) = store.read_last_run(id.application(), id.job_type()).await?
            else {
                return Ok(());
            };
            if run.id() != id || run.has_ended() {
                return Ok(());
            }
            let finished = self.finish_locked(run).await?;
            production_build = (finished.status() == RunStatus::Success
                && id.job_type().is_production())
            .then(|| finished.versions().target_application());
        }

        if let Some(build) = production_build {
            let _lease = store
                .lock(&LockKey::Application(id.application().clone()), self.lock_timeout())
                .await?;
            if let Some(mut record) = store.read_application(id.application()).await? {
                record.deployed_production_builds.insert(id.job_type(), build);
                store.write_application(&record).await?;
            }
        }
        Ok(())
    }

    /// Finishing work that must happen under the job lock, shared between
    /// [`Self::finish`] and [`Self::deploy`]'s replace-active path.
    async fn finish_locked(&self, run: Run) -> Result<Run, ControllerError> {
        let store = self.inner.store();
        let logs = self.inner.logs();
        let id = run.id().clone();
        let now = self.now_ms();
        let finished = run.finished(now)?;
        tracing::info!(run = %id, status = %finished.status(), "finished run");

        let mut history =
            store.read_historic_runs(id.application(), id.job_type()).await?;
        history.insert(id.number(), finished.clone());
        let latest = id.number();
        while history.len() > 1 {
            let Some((&oldest, oldest_run)) = history.iter().next() else {
                break;
            };
            let beyond_count = oldest + HISTORY_LENGTH <= latest;
            let beyond_age = oldest_run.start_ms() + MAX_HISTORY_AGE_MS < now;
            if !beyond_count && !beyond_age {
                break;
            }
            let evicted = oldest_run.id().clone();
            logs.delete_run(&evicted).await?;
            history.remove(&oldest);
            tracing::debug!(run = %evicted, "evicted run from history");
        }
        store
            .write_historic_runs(id.application(), id.job_type(), &history)
            .await?;
        store.delete_last_run(id.application(), id.job_type()).await?;
        logs.flush(&id).await?;
        Ok(finished)
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
