// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The step runner: executes one step of one run against the external
//! deployment and test subsystems, deciding whether to advance, retry,
//! fail, or abort.

use crate::certificates::{mint_tester_certificate, CertificateError};
use crate::controller::{JobController, LockedStep};
use crate::error::ControllerError;
use crate::SystemKind;
use async_trait::async_trait;
use ro_adapters::{
    ArtifactError, ArtifactStore, ConfigServer, ConfigServerError, DeploymentId, ErrorCode,
    Mail, Mailer, PackageKind, PrepareResponse, Routing, Suite, TesterCloud, TesterCloudError,
    TesterStatus,
};
use ro_core::{
    parse_server_logs, Clock, JobProfile, LogLevel, NotifyWhen, Run, RunId, RunStatus, Step,
    ZoneId,
};
use std::collections::BTreeSet;
use thiserror::Error;

/// Give up waiting for endpoints after this long.
pub const ENDPOINT_TIMEOUT_MS: u64 = 15 * 60 * 1000;

/// Give up waiting for installation after this long.
pub const INSTALLATION_TIMEOUT_MS: u64 = 150 * 60 * 1000;

/// Executes one leased step of a run.
#[async_trait]
pub trait StepRunner: Send + Sync + 'static {
    /// `None` means no decision yet; the maintainer retries next tick.
    async fn run(&self, locked: &LockedStep, id: &RunId) -> Option<RunStatus>;
}

/// Anything a step can trip over. Unexpected errors become `error` for
/// ordinary steps and a retry for always-run cleanup steps.
#[derive(Debug, Error)]
enum StepError {
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error("config server: {0}")]
    ConfigServer(#[from] ConfigServerError),
    #[error("tester cloud: {0}")]
    Tester(#[from] TesterCloudError),
    #[error("artifact store: {0}")]
    Artifacts(#[from] ArtifactError),
    #[error("certificate minting: {0}")]
    Certificate(#[from] CertificateError),
    #[error("tester protocol violation: {0}")]
    Protocol(String),
}

type StepOutcome = Result<Option<RunStatus>, StepError>;

/// The production step runner, with every collaborator injected through the
/// controller bundle.
pub struct DeploymentStepRunner<C, T, R, A, M, K> {
    jobs: JobController<C, T, R, A, M, K>,
}

impl<C, T, R, A, M, K> DeploymentStepRunner<C, T, R, A, M, K>
where
    C: ConfigServer,
    T: TesterCloud,
    R: Routing,
    A: ArtifactStore,
    M: Mailer,
    K: Clock,
{
    pub fn new(jobs: JobController<C, T, R, A, M, K>) -> Self {
        Self { jobs }
    }

    fn now_ms(&self) -> u64 {
        self.jobs.controller().clock().now_ms()
    }

    fn real_deployment(&self, run: &Run) -> DeploymentId {
        DeploymentId::new(run.id().application().clone(), run.id().job_type().zone())
    }

    fn tester_deployment(&self, run: &Run) -> DeploymentId {
        DeploymentId::new(
            run.id().application().tester().id().clone(),
            run.id().job_type().zone(),
        )
    }

    async fn advance(&self, step: Step, id: &RunId) -> StepOutcome {
        let run = self
            .jobs
            .active(id.application(), id.job_type())
            .await?
            .filter(|run| run.id() == id);
        let Some(run) = run else {
            // report still owes a completion notice for a sealed run;
            // everything else just stands down
            return if step == Step::Report {
                Ok(Some(RunStatus::Error))
            } else {
                Ok(None)
            };
        };

        match step {
            Step::DeployTester => self.deploy_tester(&run).await,
            Step::DeployInitialReal | Step::DeployReal => {
                self.deploy_real(&run, step).await
            }
            Step::InstallTester | Step::InstallInitialReal | Step::InstallReal => {
                self.install(&run, step).await
            }
            Step::StartTests => self.start_tests(&run).await,
            Step::EndTests => self.end_tests(&run).await,
            Step::CopyLogs => self.copy_logs(&run).await,
            Step::DeactivateReal => self.deactivate(&run, Step::DeactivateReal).await,
            Step::DeactivateTester => self.deactivate(&run, Step::DeactivateTester).await,
            Step::Report => self.report(&run).await,
        }
    }

    // ── deployment steps ─────────────────────────────────────────────────

    async fn deploy_tester(&self, run: &Run) -> StepOutcome {
        let id = run.id();
        let application = id.application();

        if self.jobs.controller().config().system == SystemKind::Public
            && run.tester_certificate().is_none()
        {
            let common_name = format!(
                "{}.{}.{}",
                application.tester(),
                id.job_type().job_name(),
                id.number()
            );
            let certificate = mint_tester_certificate(&common_name, self.now_ms())?;
            self.jobs
                .locked(id, move |run| run.with_tester_certificate(certificate))
                .await?;
            self.jobs
                .append_log(id, Step::DeployTester, LogLevel::Debug, "minted tester certificate")
                .await?;
        }

        let package = self
            .jobs
            .controller()
            .artifacts()
            .get(application, run.versions().target_application(), PackageKind::Tests)
            .await?;
        let deployment = self.tester_deployment(run);
        let result = self
            .jobs
            .controller()
            .config_server()
            .deploy(&deployment, run.versions().target_platform(), package)
            .await;
        self.handle_deployment(run, Step::DeployTester, &deployment, result).await
    }

    async fn deploy_real(&self, run: &Run, step: Step) -> StepOutcome {
        let id = run.id();
        let zone = id.job_type().zone();
        let versions = run.versions();

        // the initial deployment of a staging run sets the stage with the
        // source versions; the second deployment is the upgrade under test
        let setting_the_stage = step == Step::DeployInitialReal;
        let (platform, build) = if setting_the_stage {
            (
                versions.source_platform().unwrap_or_else(|| versions.target_platform()),
                versions.source_application().unwrap_or_else(|| versions.target_application()),
            )
        } else {
            (versions.target_platform(), versions.target_application())
        };

        let artifacts = self.jobs.controller().artifacts();
        let package = if zone.environment().is_manually_deployed() {
            artifacts.get_dev(id.application(), &zone).await?
        } else {
            artifacts.get(id.application(), build, PackageKind::Application).await?
        };

        let deployment = self.real_deployment(run);
        let result = self
            .jobs
            .controller()
            .config_server()
            .deploy(&deployment, platform, package)
            .await;
        self.handle_deployment(run, step, &deployment, result).await
    }

    async fn handle_deployment(
        &self,
        run: &Run,
        step: Step,
        deployment: &DeploymentId,
        result: Result<PrepareResponse, ConfigServerError>,
    ) -> StepOutcome {
        let id = run.id();
        let response = match result {
            Ok(response) => response,
            Err(error) => return self.handle_deploy_error(run, step, error).await,
        };

        for line in &response.log {
            self.jobs.append_log(id, step, LogLevel::Info, line.clone()).await?;
        }

        let disallowed: Vec<_> =
            response.refeed_actions.iter().filter(|action| !action.allowed).collect();
        if !disallowed.is_empty() {
            for action in disallowed {
                self.jobs
                    .append_log(
                        id,
                        step,
                        LogLevel::Error,
                        format!(
                            "refeed of {} not allowed: {}",
                            action.cluster, action.message
                        ),
                    )
                    .await?;
            }
            self.jobs
                .append_log(
                    id,
                    step,
                    LogLevel::Error,
                    "deployment needs a disallowed refeed; submit a compatible change first",
                )
                .await?;
            return Ok(Some(RunStatus::DeploymentFailed));
        }

        let mut restarted = BTreeSet::new();
        for action in &response.restart_actions {
            for host in &action.hosts {
                if restarted.insert(host.clone()) {
                    self.jobs
                        .controller()
                        .config_server()
                        .restart(deployment, host)
                        .await?;
                    self.jobs
                        .append_log(
                            id,
                            step,
                            LogLevel::Info,
                            format!("restarting services on {host}: {}", action.message),
                        )
                        .await?;
                }
            }
        }

        self.jobs.append_log(id, step, LogLevel::Info, "deployment accepted").await?;
        Ok(Some(RunStatus::Running))
    }

    async fn handle_deploy_error(
        &self,
        run: &Run,
        step: Step,
        error: ConfigServerError,
    ) -> StepOutcome {
        let id = run.id();
        let job = id.job_type();
        match error.code {
            ErrorCode::OutOfCapacity if job.is_production() => {
                self.jobs.append_log(id, step, LogLevel::Error, error.message).await?;
                Ok(Some(RunStatus::OutOfCapacity))
            }
            ErrorCode::OutOfCapacity
            | ErrorCode::ActivationConflict
            | ErrorCode::ApplicationLockFailure
            | ErrorCode::ParentHostNotReady
            | ErrorCode::CertificateNotReady
            | ErrorCode::LoadBalancerNotReady => {
                self.jobs
                    .append_log(
                        id,
                        step,
                        LogLevel::Info,
                        format!("deployment not yet possible: {}", error.message),
                    )
                    .await?;
                Ok(None)
            }
            ErrorCode::InvalidApplicationPackage | ErrorCode::BadRequest => {
                self.jobs.append_log(id, step, LogLevel::Error, error.message).await?;
                Ok(Some(RunStatus::DeploymentFailed))
            }
            ErrorCode::Other => Err(error.into()),
        }
    }

    // ── installation steps ───────────────────────────────────────────────

    async fn install(&self, run: &Run, step: Step) -> StepOutcome {
        let id = run.id();
        let zone = id.job_type().zone();
        let config_server = self.jobs.controller().config_server();

        let (deployment, platform, timeout_status) = match step {
            Step::InstallTester => (
                self.tester_deployment(run),
                run.versions().target_platform(),
                RunStatus::Error,
            ),
            Step::InstallInitialReal => (
                self.real_deployment(run),
                run.versions()
                    .source_platform()
                    .unwrap_or_else(|| run.versions().target_platform()),
                RunStatus::InstallationFailed,
            ),
            _ => (
                self.real_deployment(run),
                run.versions().target_platform(),
                RunStatus::InstallationFailed,
            ),
        };

        let Some(info) = config_server.deployment(&deployment).await else {
            self.jobs
                .append_log(id, step, LogLevel::Error, format!("{deployment} is gone"))
                .await?;
            return Ok(Some(timeout_status));
        };
        // the tester is pointless without the application it tests
        if step == Step::InstallTester
            && config_server.deployment(&self.real_deployment(run)).await.is_none()
        {
            self.jobs
                .append_log(id, step, LogLevel::Error, "real deployment is gone")
                .await?;
            return Ok(Some(RunStatus::Error));
        }

        let age_ms = self.now_ms().saturating_sub(info.at_ms);
        let nodes = config_server.list_nodes(&deployment).await;
        let nodes_settled =
            !nodes.is_empty() && nodes.iter().all(|node| node.is_settled(platform));
        let services_converged = config_server
            .converge_services(&deployment, platform)
            .await
            .is_some_and(|convergence| convergence.converged);

        if nodes_settled && services_converged {
            let endpoints =
                self.jobs.controller().routing().cluster_endpoints(&deployment).await;
            if !endpoints.is_empty() {
                self.jobs
                    .append_log(id, step, LogLevel::Info, "installation complete")
                    .await?;
                return Ok(Some(RunStatus::Running));
            }
            if timed_out(age_ms, ENDPOINT_TIMEOUT_MS, &zone) {
                self.jobs
                    .append_log(
                        id,
                        step,
                        LogLevel::Error,
                        "timed out waiting for endpoints to become available",
                    )
                    .await?;
                return Ok(Some(RunStatus::Error));
            }
            return Ok(None);
        }

        if timed_out(age_ms, INSTALLATION_TIMEOUT_MS, &zone) {
            self.jobs
                .append_log(id, step, LogLevel::Error, "installation timed out")
                .await?;
            return Ok(Some(timeout_status));
        }
        Ok(None)
    }

    // ── test steps ───────────────────────────────────────────────────────

    async fn start_tests(&self, run: &Run) -> StepOutcome {
        let id = run.id();
        let job = id.job_type();
        let config_server = self.jobs.controller().config_server();

        let real = self.real_deployment(run);
        let Some(info) = config_server.deployment(&real).await else {
            self.jobs
                .append_log(id, Step::StartTests, LogLevel::Error, "deployment vanished")
                .await?;
            return Ok(Some(RunStatus::Aborted));
        };

        let endpoints = self.jobs.controller().routing().cluster_endpoints(&real).await;
        let tester_url = self.jobs.tester_url(id.application(), job).await;
        let (endpoints, url) = match (endpoints.is_empty(), tester_url) {
            (false, Some(url)) => (endpoints, url),
            _ => {
                let age_ms = self.now_ms().saturating_sub(info.at_ms);
                if timed_out(age_ms, ENDPOINT_TIMEOUT_MS, &job.zone()) {
                    self.jobs
                        .append_log(
                            id,
                            Step::StartTests,
                            LogLevel::Error,
                            "timed out waiting for endpoints to become available",
                        )
                        .await?;
                    return Ok(Some(RunStatus::Error));
                }
                return Ok(None);
            }
        };

        if !self.jobs.controller().tester().ready(&url).await {
            return Ok(None);
        }

        let zone = job.zone().to_string();
        let mut config = serde_json::json!({
            "application": id.application().serialized_form(),
            "zone": zone.clone(),
            "system": self.jobs.controller().config().system.to_string(),
        });
        config["zoneEndpoints"][zone.as_str()] = serde_json::json!(endpoints);
        self.jobs
            .controller()
            .tester()
            .start_tests(&url, Suite::of(job), config)
            .await?;
        self.jobs.append_log(id, Step::StartTests, LogLevel::Info, "tests started").await?;
        Ok(Some(RunStatus::Running))
    }

    async fn end_tests(&self, run: &Run) -> StepOutcome {
        let id = run.id();
        let config_server = self.jobs.controller().config_server();

        if config_server.deployment(&self.real_deployment(run)).await.is_none() {
            self.jobs
                .append_log(id, Step::EndTests, LogLevel::Error, "deployment vanished")
                .await?;
            return Ok(Some(RunStatus::Aborted));
        }
        if let Some(certificate) = run.tester_certificate() {
            if !certificate.is_valid_at(self.now_ms()) {
                self.jobs
                    .append_log(
                        id,
                        Step::EndTests,
                        LogLevel::Error,
                        "tester certificate is no longer valid",
                    )
                    .await?;
                return Ok(Some(RunStatus::Aborted));
            }
        }

        self.jobs.update_test_log(id).await?;

        let Some(url) = self.jobs.tester_url(id.application(), id.job_type()).await else {
            return Ok(None);
        };
        match self.jobs.controller().tester().status(&url).await? {
            TesterStatus::Running => Ok(None),
            TesterStatus::Success => {
                self.jobs
                    .append_log(id, Step::EndTests, LogLevel::Info, "tests completed")
                    .await?;
                Ok(Some(RunStatus::Running))
            }
            TesterStatus::Failure => {
                self.jobs
                    .append_log(id, Step::EndTests, LogLevel::Error, "tests failed")
                    .await?;
                Ok(Some(RunStatus::TestFailure))
            }
            TesterStatus::Error => {
                self.jobs
                    .append_log(id, Step::EndTests, LogLevel::Error, "tester reported an error")
                    .await?;
                Ok(Some(RunStatus::Error))
            }
            TesterStatus::NotStarted => Err(StepError::Protocol(
                "tester reports tests not started after they were started".to_string(),
            )),
        }
    }

    // ── cleanup steps ────────────────────────────────────────────────────

    /// Best-effort copy of the deployment's server logs into the run log.
    async fn copy_logs(&self, run: &Run) -> StepOutcome {
        let id = run.id();
        let config_server = self.jobs.controller().config_server();
        let real = self.real_deployment(run);

        if config_server.deployment(&real).await.is_some() {
            let copied: Result<(), StepError> = async {
                let raw = config_server.get_logs(&real).await?;
                let entries = parse_server_logs(&raw);
                self.jobs.append_entries(id, Step::CopyLogs, entries).await?;
                Ok(())
            }
            .await;
            if let Err(error) = copied {
                tracing::warn!(run = %id, error = %error, "log copying failed");
                return Ok(Some(RunStatus::Error));
            }
        }
        Ok(Some(RunStatus::Running))
    }

    async fn deactivate(&self, run: &Run, step: Step) -> StepOutcome {
        let id = run.id();
        let deployment = if step == Step::DeactivateTester {
            self.tester_deployment(run)
        } else {
            self.real_deployment(run)
        };
        match self.jobs.controller().config_server().deactivate(&deployment).await {
            Ok(()) => {
                self.jobs
                    .append_log(id, step, LogLevel::Info, format!("deactivated {deployment}"))
                    .await?;
                Ok(Some(RunStatus::Running))
            }
            Err(error) => {
                self.jobs
                    .append_log(
                        id,
                        step,
                        LogLevel::Error,
                        format!("deactivation of {deployment} failed: {error}"),
                    )
                    .await?;
                Ok(Some(RunStatus::Error))
            }
        }
    }

    /// Idempotent completion report, with failure notification mails chosen
    /// by run status. Mailer errors are swallowed into the log.
    async fn report(&self, run: &Run) -> StepOutcome {
        let id = run.id();
        let summary = format!("run {} completed with status {}", id, run.status());
        self.jobs.append_log(id, Step::Report, LogLevel::Info, summary).await?;
        tracing::info!(
            run = %id,
            status = %run.status(),
            "reporting completion to deployment triggering"
        );

        if run.has_failed() && run.status() != RunStatus::Aborted {
            if let Some(mail) = self.failure_mail(run).await? {
                if let Err(error) = self.jobs.controller().mailer().send(mail).await {
                    self.jobs
                        .append_log(
                            id,
                            Step::Report,
                            LogLevel::Warning,
                            format!("failed to send notification mail: {error}"),
                        )
                        .await?;
                }
            }
        }
        Ok(Some(RunStatus::Running))
    }

    async fn failure_mail(&self, run: &Run) -> Result<Option<Mail>, StepError> {
        let id = run.id();
        let Some(record) = self.jobs.application(id.application()).await? else {
            return Ok(None);
        };

        let when = if run.versions().includes_application_change() {
            NotifyWhen::FailingCommit
        } else {
            NotifyWhen::Failing
        };
        let target = record.notifications.target(when);
        let mut recipients = target.emails.clone();
        if target.include_author {
            let author = record
                .version(run.versions().target_application())
                .and_then(|version| version.author_email.clone());
            recipients.extend(author);
        }
        recipients.sort();
        recipients.dedup();
        if recipients.is_empty() {
            return Ok(None);
        }

        let subject = match run.status() {
            RunStatus::OutOfCapacity => format!("{id} could not get capacity"),
            RunStatus::DeploymentFailed => format!("{id} failed to deploy"),
            RunStatus::InstallationFailed => format!("{id} failed to install"),
            RunStatus::TestFailure => format!("{id} failed its tests"),
            _ => format!("{id} met a system error"),
        };
        let body = format!(
            "Job {} for {} failed with status {}.\n\
             Consult the run log for details.",
            id.job_type(),
            id.application(),
            run.status()
        );
        Ok(Some(Mail::new(recipients, subject, body)))
    }
}

/// Whether `age_ms` exceeds `timeout_ms`, with the budget shortened to the
/// zone's deployment TTL less one minute so logs can still be copied before
/// the deployment expires.
fn timed_out(age_ms: u64, timeout_ms: u64, zone: &ZoneId) -> bool {
    let budget = match zone.deployment_ttl_ms() {
        Some(ttl) => timeout_ms.min(ttl.saturating_sub(60_000)),
        None => timeout_ms,
    };
    age_ms >= budget
}

#[async_trait]
impl<C, T, R, A, M, K> StepRunner for DeploymentStepRunner<C, T, R, A, M, K>
where
    C: ConfigServer,
    T: TesterCloud,
    R: Routing,
    A: ArtifactStore,
    M: Mailer,
    K: Clock,
{
    async fn run(&self, locked: &LockedStep, id: &RunId) -> Option<RunStatus> {
        let step = locked.step();
        tracing::debug!(run = %id, step = %step, "executing step");
        match self.advance(step, id).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!(run = %id, step = %step, error = %error, "step raised unexpectedly");
                let _ = self
                    .jobs
                    .append_log(
                        id,
                        step,
                        LogLevel::Error,
                        format!("unexpected error: {error}"),
                    )
                    .await;
                if JobProfile::of(id.job_type()).is_always_run(step) {
                    None
                } else {
                    Some(RunStatus::Error)
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
