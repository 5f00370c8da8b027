// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ro-engine: the Rollout job controller, step runner, and maintainer.

pub mod certificates;
pub mod controller;
pub mod error;
pub mod maintainer;
pub mod runner;

#[cfg(test)]
mod test_helpers;

pub use controller::{JobController, LockedStep};
pub use error::ControllerError;
pub use maintainer::JobMaintainer;
pub use runner::{DeploymentStepRunner, StepRunner};

use ro_adapters::{ArtifactStore, ConfigServer, Mailer, Routing, TesterCloud};
use ro_core::{Clock, PlatformVersion};
use ro_storage::{LogStore, RunStore};
use std::sync::Arc;
use tokio::sync::Notify;

/// Which kind of system this controller serves. Public systems mint tester
/// certificates for their test jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemKind {
    Public,
    Main,
}

ro_core::simple_display! {
    SystemKind {
        Public => "public",
        Main => "main",
    }
}

/// Tunables for the controller and maintainer.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub system: SystemKind,
    /// A run still going after this long is aborted.
    pub job_timeout_ms: u64,
    /// Size of the step worker pool.
    pub worker_count: usize,
    /// Wait bound for application and job locks.
    pub lock_timeout_ms: u64,
    /// Wait bound for a step's own lock.
    pub step_lock_timeout_ms: u64,
    /// Wait bound for the brief prerequisite-idleness latches.
    pub prerequisite_latch_timeout_ms: u64,
    pub maintainer_interval_ms: u64,
    /// Platform for manual deployments that name none.
    pub default_platform: PlatformVersion,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            system: SystemKind::Main,
            job_timeout_ms: 24 * 60 * 60 * 1000,
            worker_count: 32,
            lock_timeout_ms: 10_000,
            step_lock_timeout_ms: 10_000,
            prerequisite_latch_timeout_ms: 1_000,
            maintainer_interval_ms: 10_000,
            default_platform: PlatformVersion::new(1, 0, 0),
        }
    }
}

impl ControllerConfig {
    ro_core::setters! {
        set {
            system: SystemKind,
            job_timeout_ms: u64,
            worker_count: usize,
            lock_timeout_ms: u64,
            step_lock_timeout_ms: u64,
            prerequisite_latch_timeout_ms: u64,
            maintainer_interval_ms: u64,
            default_platform: PlatformVersion,
        }
    }
}

/// Bundle of every collaborator the controller works through, injected once
/// at construction. The only process-wide state anywhere is the maintainer's
/// worker pool.
pub struct Controller<C, T, R, A, M, K> {
    config: ControllerConfig,
    clock: K,
    store: Arc<dyn RunStore>,
    logs: Arc<dyn LogStore>,
    config_server: C,
    tester: T,
    routing: R,
    artifacts: A,
    mailer: M,
    wake: Notify,
}

impl<C, T, R, A, M, K> Controller<C, T, R, A, M, K>
where
    C: ConfigServer,
    T: TesterCloud,
    R: Routing,
    A: ArtifactStore,
    M: Mailer,
    K: Clock,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ControllerConfig,
        clock: K,
        store: Arc<dyn RunStore>,
        logs: Arc<dyn LogStore>,
        config_server: C,
        tester: T,
        routing: R,
        artifacts: A,
        mailer: M,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            clock,
            store,
            logs,
            config_server,
            tester,
            routing,
            artifacts,
            mailer,
            wake: Notify::new(),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    pub fn logs(&self) -> &Arc<dyn LogStore> {
        &self.logs
    }

    pub fn config_server(&self) -> &C {
        &self.config_server
    }

    pub fn tester(&self) -> &T {
        &self.tester
    }

    pub fn routing(&self) -> &R {
        &self.routing
    }

    pub fn artifacts(&self) -> &A {
        &self.artifacts
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    /// Wake handle for kicking the maintainer between ticks.
    pub fn wake(&self) -> &Notify {
        &self.wake
    }
}
