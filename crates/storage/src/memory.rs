// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory reference implementation of the durable store.
//!
//! Documents are held as serialized JSON so every read and write exercises
//! the same round-trip a remote consensus store would.

use crate::keys::LockKey;
use crate::store::{Lease, RunStore, StoreError};
use async_trait::async_trait;
use parking_lot::Mutex;
use ro_core::{ApplicationId, ApplicationRecord, JobType, Run};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Documents {
    last_runs: HashMap<(ApplicationId, JobType), String>,
    histories: HashMap<(ApplicationId, JobType), String>,
    applications: HashMap<ApplicationId, String>,
}

#[derive(Default)]
struct Inner {
    locks: Mutex<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>,
    documents: Mutex<Documents>,
}

/// In-memory durable store with leased per-key locks.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn mutex_for(&self, key: &LockKey) -> Arc<tokio::sync::Mutex<()>> {
        self.inner
            .locks
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn lock(&self, key: &LockKey, timeout: Duration) -> Result<Lease, StoreError> {
        let mutex = self.mutex_for(key);
        match tokio::time::timeout(timeout, mutex.lock_owned()).await {
            Ok(guard) => Ok(Lease::new(guard)),
            Err(_) => Err(StoreError::LockTimeout(key.to_string())),
        }
    }

    fn try_lock(&self, key: &LockKey) -> Result<Lease, StoreError> {
        self.mutex_for(key)
            .try_lock_owned()
            .map(Lease::new)
            .map_err(|_| StoreError::LockBusy(key.to_string()))
    }

    async fn read_last_run(
        &self,
        id: &ApplicationId,
        job: JobType,
    ) -> Result<Option<Run>, StoreError> {
        let documents = self.inner.documents.lock();
        documents
            .last_runs
            .get(&(id.clone(), job))
            .map(|json| serde_json::from_str(json))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn write_last_run(&self, run: &Run) -> Result<(), StoreError> {
        let json = serde_json::to_string(run)?;
        let key = (run.id().application().clone(), run.id().job_type());
        self.inner.documents.lock().last_runs.insert(key, json);
        Ok(())
    }

    async fn delete_last_run(
        &self,
        id: &ApplicationId,
        job: JobType,
    ) -> Result<(), StoreError> {
        self.inner.documents.lock().last_runs.remove(&(id.clone(), job));
        Ok(())
    }

    async fn read_historic_runs(
        &self,
        id: &ApplicationId,
        job: JobType,
    ) -> Result<std::collections::BTreeMap<u64, Run>, StoreError> {
        let documents = self.inner.documents.lock();
        match documents.histories.get(&(id.clone(), job)) {
            Some(json) => Ok(serde_json::from_str(json)?),
            None => Ok(Default::default()),
        }
    }

    async fn write_historic_runs(
        &self,
        id: &ApplicationId,
        job: JobType,
        runs: &std::collections::BTreeMap<u64, Run>,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(runs)?;
        self.inner.documents.lock().histories.insert((id.clone(), job), json);
        Ok(())
    }

    async fn delete_run_data(
        &self,
        id: &ApplicationId,
        job: Option<JobType>,
    ) -> Result<(), StoreError> {
        let mut documents = self.inner.documents.lock();
        match job {
            Some(job) => {
                documents.last_runs.remove(&(id.clone(), job));
                documents.histories.remove(&(id.clone(), job));
            }
            None => {
                documents.last_runs.retain(|(app, _), _| app != id);
                documents.histories.retain(|(app, _), _| app != id);
            }
        }
        Ok(())
    }

    async fn applications_with_jobs(&self) -> Result<Vec<ApplicationId>, StoreError> {
        let documents = self.inner.documents.lock();
        let ids: BTreeSet<ApplicationId> = documents
            .last_runs
            .keys()
            .chain(documents.histories.keys())
            .map(|(app, _)| app.clone())
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn read_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        let documents = self.inner.documents.lock();
        documents
            .applications
            .get(id)
            .map(|json| serde_json::from_str(json))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn write_application(&self, record: &ApplicationRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        self.inner.documents.lock().applications.insert(record.id.clone(), json);
        Ok(())
    }

    async fn remove_application(&self, id: &ApplicationId) -> Result<(), StoreError> {
        self.inner.documents.lock().applications.remove(id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
