// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The maintainer loop: periodically leases and dispatches every active
//! run's ready steps onto the worker pool, and finishes runs that can make
//! no further progress.

use crate::controller::JobController;
use crate::runner::StepRunner;
use crate::Controller;
use ro_adapters::{ArtifactStore, ConfigServer, Mailer, Routing, TesterCloud};
use ro_core::{Clock, Run, RunId, RunStatus, Step, StepStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Drives active runs forward, one step dispatch at a time.
pub struct JobMaintainer<C, T, R, A, M, K> {
    controller: Arc<Controller<C, T, R, A, M, K>>,
    jobs: JobController<C, T, R, A, M, K>,
    runner: Arc<dyn StepRunner>,
    permits: Arc<Semaphore>,
}

impl<C, T, R, A, M, K> Clone for JobMaintainer<C, T, R, A, M, K> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
            jobs: self.jobs.clone(),
            runner: self.runner.clone(),
            permits: self.permits.clone(),
        }
    }
}

impl<C, T, R, A, M, K> JobMaintainer<C, T, R, A, M, K>
where
    C: ConfigServer,
    T: TesterCloud,
    R: Routing,
    A: ArtifactStore,
    M: Mailer,
    K: Clock,
{
    pub fn new(
        controller: Arc<Controller<C, T, R, A, M, K>>,
        runner: Arc<dyn StepRunner>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(controller.config().worker_count));
        let jobs = JobController::new(controller.clone());
        Self { controller, jobs, runner, permits }
    }

    /// One maintenance pass over every active run. Awaits the workers it
    /// dispatches, so successive ticks observe each other's results.
    pub async fn tick(&self) {
        let runs = match self.jobs.active_runs().await {
            Ok(runs) => runs,
            Err(error) => {
                tracing::warn!(error = %error, "could not enumerate active runs");
                return;
            }
        };

        let mut workers = JoinSet::new();
        for run in runs {
            let run = self.expire(run).await;
            let ready = run.ready_steps();
            if ready.is_empty() {
                if let Err(error) = self.jobs.finish(run.id()).await {
                    tracing::warn!(run = %run.id(), error = %error, "could not finish run");
                }
                continue;
            }
            for step in ready {
                let Ok(permit) = self.permits.clone().try_acquire_owned() else {
                    tracing::debug!(run = %run.id(), step = %step, "worker pool saturated");
                    continue;
                };
                let maintainer = self.clone();
                let id = run.id().clone();
                workers.spawn(async move {
                    let _permit = permit;
                    maintainer.advance(id, step).await;
                });
            }
        }
        while workers.join_next().await.is_some() {}
    }

    /// Abort a run still going past the job timeout. Returns the refreshed
    /// run so the tick proceeds straight to its cleanup steps.
    async fn expire(&self, run: Run) -> Run {
        let config = self.controller.config();
        let age_ms = self.controller.clock().now_ms().saturating_sub(run.start_ms());
        if run.status() != RunStatus::Running || age_ms < config.job_timeout_ms {
            return run;
        }
        tracing::info!(run = %run.id(), "aborting run past the job timeout");
        match self.jobs.locked(run.id(), |run| Ok(run.aborted())).await {
            Ok(Some(updated)) => updated,
            Ok(None) => run,
            Err(error) => {
                tracing::warn!(run = %run.id(), error = %error, "could not abort expired run");
                run
            }
        }
    }

    /// Lease and execute one step, then fold its outcome into the run.
    /// The commit happens after the step lock is released; it re-checks the
    /// step is still unfinished, so a late commit is harmless.
    async fn advance(&self, id: RunId, step: Step) {
        let locked =
            match self.jobs.lock_step(id.application(), id.job_type(), step).await {
                Ok(locked) => locked,
                Err(error) => {
                    tracing::debug!(
                        run = %id, step = %step, error = %error,
                        "step is busy; retrying next tick"
                    );
                    return;
                }
            };

        // defensive re-read now that the lock is held
        let still_ready = match self.jobs.active(id.application(), id.job_type()).await {
            Ok(Some(run)) if run.id() == &id => run.ready_steps().contains(&step),
            _ => false,
        };
        if !still_ready {
            return;
        }

        let outcome = self.runner.run(&locked, &id).await;
        drop(locked);

        if let Some(status) = outcome {
            let committed = self
                .jobs
                .locked(&id, move |run| {
                    Ok(if run.step_status(step) == Some(StepStatus::Unfinished) {
                        run.with_step_status(status, step)
                    } else {
                        run
                    })
                })
                .await;
            match committed {
                Ok(_) => {
                    tracing::info!(run = %id, step = %step, status = %status, "step resolved")
                }
                Err(error) => {
                    tracing::warn!(
                        run = %id, step = %step, error = %error,
                        "could not record step outcome"
                    );
                }
            }
        }
    }

    /// Run the periodic loop until the returned handle is aborted. A wake
    /// through [`Controller::wake`] triggers an immediate extra pass.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let period = Duration::from_millis(self.controller.config().maintainer_interval_ms);
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = self.controller.wake().notified() => {}
                }
                self.tick().await;
            }
        })
    }
}

#[cfg(test)]
#[path = "maintainer_tests.rs"]
mod tests;
