// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller errors.

use ro_adapters::{ArtifactError, TesterCloudError};
use ro_core::{ApplicationId, JobType, RunError};
use ro_storage::{LogError, StoreError};
use thiserror::Error;

/// Errors surfaced by the job controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("application {0} not found")]
    ApplicationNotFound(ApplicationId),
    #[error("{0}/{1} already has an active run")]
    AlreadyRunning(ApplicationId, JobType),
    #[error("unknown target application build {build} for {application}")]
    InvalidVersions { application: ApplicationId, build: u64 },
    #[error("{0} is not a manually deployed job")]
    NotManuallyDeployed(JobType),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Log(#[from] LogError),
    #[error("artifact store: {0}")]
    Artifacts(#[from] ArtifactError),
    #[error("tester cloud: {0}")]
    Tester(#[from] TesterCloudError),
    #[error(transparent)]
    Run(#[from] RunError),
}

impl ControllerError {
    /// Lock-acquisition timeouts are left for the next maintenance tick.
    pub fn is_lock_timeout(&self) -> bool {
        matches!(
            self,
            ControllerError::Store(StoreError::LockTimeout(_))
                | ControllerError::Store(StoreError::LockBusy(_))
        )
    }
}
