// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The config server contract: deploys, activates, and monitors
//! applications and their nodes.

use async_trait::async_trait;
use ro_core::{ApplicationId, PlatformVersion, ZoneId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One deployment of an application (or its tester) in one zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentId {
    pub application: ApplicationId,
    pub zone: ZoneId,
}

impl DeploymentId {
    pub fn new(application: ApplicationId, zone: ZoneId) -> Self {
        Self { application, zone }
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.application, self.zone)
    }
}

/// Well-known config server error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    OutOfCapacity,
    ActivationConflict,
    ApplicationLockFailure,
    ParentHostNotReady,
    CertificateNotReady,
    LoadBalancerNotReady,
    InvalidApplicationPackage,
    BadRequest,
    Other,
}

#[derive(Debug, Clone, Error)]
#[error("config server rejected with {code:?}: {message}")]
pub struct ConfigServerError {
    pub code: ErrorCode,
    pub message: String,
}

impl ConfigServerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// A cluster restart the prepare phase requires, to be issued host by host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartAction {
    pub cluster: String,
    pub hosts: Vec<String>,
    pub message: String,
}

/// A refeed the prepare phase requires. Disallowed refeeds block deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefeedAction {
    pub cluster: String,
    pub allowed: bool,
    pub message: String,
}

/// Outcome of a successful prepare-and-activate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareResponse {
    pub restart_actions: Vec<RestartAction>,
    pub refeed_actions: Vec<RefeedAction>,
    pub log: Vec<String>,
}

/// A live deployment as the config server sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentInfo {
    /// When the current deployment was made.
    pub at_ms: u64,
    pub platform: PlatformVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Up,
    Down,
    Unknown,
}

/// One service's convergence towards the wanted config generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub host: String,
    pub port: u16,
    pub service_type: String,
    pub current_generation: u64,
}

/// The config convergence report for a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConvergence {
    pub wanted_generation: u64,
    pub converged: bool,
    pub services: Vec<ServiceStatus>,
}

/// One allocated node's versions and generations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub hostname: String,
    pub current_version: Option<PlatformVersion>,
    pub wanted_version: PlatformVersion,
    pub restart_generation: u64,
    pub wanted_restart_generation: u64,
    pub reboot_generation: u64,
    pub wanted_reboot_generation: u64,
    pub service_state: ServiceState,
}

impl NodeInfo {
    /// A node is settled once it runs the wanted version and has caught up
    /// on restarts and reboots.
    pub fn is_settled(&self, target: PlatformVersion) -> bool {
        self.current_version == Some(target)
            && self.restart_generation >= self.wanted_restart_generation
            && self.reboot_generation >= self.wanted_reboot_generation
            && self.service_state == ServiceState::Up
    }
}

/// The config server / node repository.
#[async_trait]
pub trait ConfigServer: Clone + Send + Sync + 'static {
    /// Submit a package for deployment, returning the prepare response.
    async fn deploy(
        &self,
        deployment: &DeploymentId,
        platform: PlatformVersion,
        package: Vec<u8>,
    ) -> Result<PrepareResponse, ConfigServerError>;

    async fn deactivate(&self, deployment: &DeploymentId)
        -> Result<(), ConfigServerError>;

    /// The live deployment, or None if it has vanished.
    async fn deployment(&self, deployment: &DeploymentId) -> Option<DeploymentInfo>;

    async fn converge_services(
        &self,
        deployment: &DeploymentId,
        platform: PlatformVersion,
    ) -> Option<ServiceConvergence>;

    async fn list_nodes(&self, deployment: &DeploymentId) -> Vec<NodeInfo>;

    /// Restart the services on one host.
    async fn restart(
        &self,
        deployment: &DeploymentId,
        hostname: &str,
    ) -> Result<(), ConfigServerError>;

    /// Stream the deployment's server logs.
    async fn get_logs(&self, deployment: &DeploymentId) -> Result<Vec<u8>, ConfigServerError>;

    async fn content_clusters(&self, deployment: &DeploymentId) -> Vec<String>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use ro_core::{Clock, FakeClock};
    use std::collections::{HashMap, VecDeque};
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    struct FakeDeployment {
        at_ms: u64,
        platform: PlatformVersion,
        converged: bool,
        clusters: Vec<String>,
        log_bytes: Vec<u8>,
    }

    #[derive(Default)]
    struct FakeState {
        deployments: HashMap<DeploymentId, FakeDeployment>,
        prepare_responses: HashMap<DeploymentId, VecDeque<PrepareResponse>>,
        deploy_failures: HashMap<DeploymentId, VecDeque<ConfigServerError>>,
        restarts: Vec<(DeploymentId, String)>,
        deactivations: Vec<DeploymentId>,
        auto_converge: bool,
    }

    /// Scriptable config server double.
    ///
    /// Deployments converge immediately by default; tests flip
    /// `auto_converge` or `set_converged` to hold them back.
    #[derive(Clone)]
    pub struct FakeConfigServer {
        clock: FakeClock,
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeConfigServer {
        pub fn new(clock: FakeClock) -> Self {
            let state = FakeState { auto_converge: true, ..Default::default() };
            Self { clock, state: Arc::new(Mutex::new(state)) }
        }

        /// Whether fresh deployments start out converged.
        pub fn set_auto_converge(&self, converge: bool) {
            self.state.lock().auto_converge = converge;
        }

        pub fn set_converged(&self, deployment: &DeploymentId, converged: bool) {
            if let Some(d) = self.state.lock().deployments.get_mut(deployment) {
                d.converged = converged;
            }
        }

        /// Queue a prepare response for the next deploy of `deployment`.
        pub fn respond_to_deploy(&self, deployment: &DeploymentId, response: PrepareResponse) {
            self.state
                .lock()
                .prepare_responses
                .entry(deployment.clone())
                .or_default()
                .push_back(response);
        }

        /// Queue a failure for the next deploy of `deployment`.
        pub fn fail_next_deploy(&self, deployment: &DeploymentId, error: ConfigServerError) {
            self.state
                .lock()
                .deploy_failures
                .entry(deployment.clone())
                .or_default()
                .push_back(error);
        }

        pub fn set_log_bytes(&self, deployment: &DeploymentId, bytes: Vec<u8>) {
            if let Some(d) = self.state.lock().deployments.get_mut(deployment) {
                d.log_bytes = bytes;
            }
        }

        /// Remove the deployment out from under the runner.
        pub fn remove_deployment(&self, deployment: &DeploymentId) {
            self.state.lock().deployments.remove(deployment);
        }

        pub fn has_deployment(&self, deployment: &DeploymentId) -> bool {
            self.state.lock().deployments.contains_key(deployment)
        }

        pub fn restarts(&self) -> Vec<(DeploymentId, String)> {
            self.state.lock().restarts.clone()
        }

        pub fn deactivations(&self) -> Vec<DeploymentId> {
            self.state.lock().deactivations.clone()
        }
    }

    #[async_trait]
    impl ConfigServer for FakeConfigServer {
        async fn deploy(
            &self,
            deployment: &DeploymentId,
            platform: PlatformVersion,
            _package: Vec<u8>,
        ) -> Result<PrepareResponse, ConfigServerError> {
            let mut state = self.state.lock();
            if let Some(error) = state
                .deploy_failures
                .get_mut(deployment)
                .and_then(VecDeque::pop_front)
            {
                return Err(error);
            }
            let response = state
                .prepare_responses
                .get_mut(deployment)
                .and_then(VecDeque::pop_front)
                .unwrap_or_default();
            let converged = state.auto_converge;
            state.deployments.insert(
                deployment.clone(),
                FakeDeployment {
                    at_ms: self.clock.now_ms(),
                    platform,
                    converged,
                    clusters: vec!["default".to_string()],
                    log_bytes: Vec::new(),
                },
            );
            Ok(response)
        }

        async fn deactivate(
            &self,
            deployment: &DeploymentId,
        ) -> Result<(), ConfigServerError> {
            let mut state = self.state.lock();
            state.deployments.remove(deployment);
            state.deactivations.push(deployment.clone());
            Ok(())
        }

        async fn deployment(&self, deployment: &DeploymentId) -> Option<DeploymentInfo> {
            self.state
                .lock()
                .deployments
                .get(deployment)
                .map(|d| DeploymentInfo { at_ms: d.at_ms, platform: d.platform })
        }

        async fn converge_services(
            &self,
            deployment: &DeploymentId,
            _platform: PlatformVersion,
        ) -> Option<ServiceConvergence> {
            self.state.lock().deployments.get(deployment).map(|d| ServiceConvergence {
                wanted_generation: 2,
                converged: d.converged,
                services: vec![ServiceStatus {
                    host: format!("host1.{}", deployment.zone),
                    port: 8080,
                    service_type: "container".to_string(),
                    current_generation: if d.converged { 2 } else { 1 },
                }],
            })
        }

        async fn list_nodes(&self, deployment: &DeploymentId) -> Vec<NodeInfo> {
            let state = self.state.lock();
            let Some(d) = state.deployments.get(deployment) else {
                return Vec::new();
            };
            vec![NodeInfo {
                hostname: format!("host1.{}", deployment.zone),
                current_version: d.converged.then_some(d.platform),
                wanted_version: d.platform,
                restart_generation: 1,
                wanted_restart_generation: 1,
                reboot_generation: 1,
                wanted_reboot_generation: 1,
                service_state: if d.converged { ServiceState::Up } else { ServiceState::Down },
            }]
        }

        async fn restart(
            &self,
            deployment: &DeploymentId,
            hostname: &str,
        ) -> Result<(), ConfigServerError> {
            self.state.lock().restarts.push((deployment.clone(), hostname.to_string()));
            Ok(())
        }

        async fn get_logs(
            &self,
            deployment: &DeploymentId,
        ) -> Result<Vec<u8>, ConfigServerError> {
            self.state
                .lock()
                .deployments
                .get(deployment)
                .map(|d| d.log_bytes.clone())
                .ok_or_else(|| {
                    ConfigServerError::new(ErrorCode::BadRequest, format!("{deployment} is gone"))
                })
        }

        async fn content_clusters(&self, deployment: &DeploymentId) -> Vec<String> {
            self.state
                .lock()
                .deployments
                .get(deployment)
                .map(|d| d.clusters.clone())
                .unwrap_or_default()
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeConfigServer;

#[cfg(test)]
#[path = "config_server_tests.rs"]
mod tests;
