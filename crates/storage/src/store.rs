// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable store contract.
//!
//! A versioned KV with per-key leased locks. This crate consumes the
//! contract; the in-memory [`crate::MemoryStore`] is the reference backend.

use crate::keys::LockKey;
use async_trait::async_trait;
use ro_core::{ApplicationId, ApplicationRecord, JobType, Run};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("timed out acquiring lock {0}")]
    LockTimeout(String),
    #[error("lock {0} is held elsewhere")]
    LockBusy(String),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A held lock. Dropping the lease releases the lock.
#[derive(Debug)]
pub struct Lease {
    _guard: OwnedMutexGuard<()>,
}

impl Lease {
    pub(crate) fn new(guard: OwnedMutexGuard<()>) -> Self {
        Self { _guard: guard }
    }
}

/// The durable run and application registry.
///
/// Object safe so backends can be injected as `Arc<dyn RunStore>`.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Acquire the named lock, waiting up to `timeout`.
    async fn lock(&self, key: &LockKey, timeout: Duration) -> Result<Lease, StoreError>;

    /// Acquire the named lock only if it is free right now.
    fn try_lock(&self, key: &LockKey) -> Result<Lease, StoreError>;

    async fn read_last_run(
        &self,
        id: &ApplicationId,
        job: JobType,
    ) -> Result<Option<Run>, StoreError>;

    async fn write_last_run(&self, run: &Run) -> Result<(), StoreError>;

    async fn delete_last_run(&self, id: &ApplicationId, job: JobType)
        -> Result<(), StoreError>;

    /// Historic runs keyed by run number, oldest first.
    async fn read_historic_runs(
        &self,
        id: &ApplicationId,
        job: JobType,
    ) -> Result<BTreeMap<u64, Run>, StoreError>;

    async fn write_historic_runs(
        &self,
        id: &ApplicationId,
        job: JobType,
        runs: &BTreeMap<u64, Run>,
    ) -> Result<(), StoreError>;

    /// Drop all run data for the application, or only one job's.
    async fn delete_run_data(
        &self,
        id: &ApplicationId,
        job: Option<JobType>,
    ) -> Result<(), StoreError>;

    /// Every application with any persisted run data.
    async fn applications_with_jobs(&self) -> Result<Vec<ApplicationId>, StoreError>;

    async fn read_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError>;

    async fn write_application(&self, record: &ApplicationRecord) -> Result<(), StoreError>;

    async fn remove_application(&self, id: &ApplicationId) -> Result<(), StoreError>;
}
