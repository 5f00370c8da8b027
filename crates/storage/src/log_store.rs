// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only per-run log store.

use async_trait::async_trait;
use parking_lot::Mutex;
use ro_core::{ApplicationId, LogEntry, RunId, Step};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Errors from log store operations.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("log for {0} is already archived")]
    AlreadyArchived(RunId),
}

/// The log of one run, grouped per step. Entry ids are monotonic across the
/// whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunLog {
    entries: BTreeMap<Step, Vec<LogEntry>>,
    last_id: u64,
}

impl RunLog {
    pub fn entries(&self) -> &BTreeMap<Step, Vec<LogEntry>> {
        &self.entries
    }

    pub fn step(&self, step: Step) -> &[LogEntry] {
        self.entries.get(&step).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Id of the newest entry, 0 when empty.
    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    fn append(&mut self, step: Step, entries: Vec<LogEntry>) {
        let slot = self.entries.entry(step).or_default();
        for mut entry in entries {
            self.last_id += 1;
            entry.id = self.last_id;
            slot.push(entry);
        }
    }

    fn after(&self, after_id: u64) -> RunLog {
        let entries: BTreeMap<Step, Vec<LogEntry>> = self
            .entries
            .iter()
            .map(|(step, entries)| {
                (*step, entries.iter().filter(|e| e.id > after_id).cloned().collect())
            })
            .filter(|(_, entries): &(Step, Vec<LogEntry>)| !entries.is_empty())
            .collect();
        RunLog { entries, last_id: self.last_id }
    }
}

/// Append-only log store with an active buffer and a finished archive.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append entries under a step, assigning monotonic ids.
    async fn append(
        &self,
        id: &RunId,
        step: Step,
        entries: Vec<LogEntry>,
    ) -> Result<(), LogError>;

    /// Entries of an active run newer than `after_id`.
    async fn read_active(&self, id: &RunId, after_id: u64) -> Result<RunLog, LogError>;

    /// Entries of a finished run newer than `after_id`, if archived.
    async fn read_finished(
        &self,
        id: &RunId,
        after_id: u64,
    ) -> Result<Option<RunLog>, LogError>;

    /// Move the active buffer to the finished archive.
    async fn flush(&self, id: &RunId) -> Result<(), LogError>;

    /// Delete one run's logs, buffered and archived.
    async fn delete_run(&self, id: &RunId) -> Result<(), LogError>;

    /// Delete every log of the application.
    async fn delete_application(&self, id: &ApplicationId) -> Result<(), LogError>;
}

#[derive(Default)]
struct LogState {
    active: HashMap<RunId, RunLog>,
    finished: HashMap<RunId, RunLog>,
}

/// In-memory reference implementation of [`LogStore`].
#[derive(Clone, Default)]
pub struct MemoryLogStore {
    state: Arc<Mutex<LogState>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn append(
        &self,
        id: &RunId,
        step: Step,
        entries: Vec<LogEntry>,
    ) -> Result<(), LogError> {
        let mut state = self.state.lock();
        if state.finished.contains_key(id) {
            return Err(LogError::AlreadyArchived(id.clone()));
        }
        state.active.entry(id.clone()).or_default().append(step, entries);
        Ok(())
    }

    async fn read_active(&self, id: &RunId, after_id: u64) -> Result<RunLog, LogError> {
        let state = self.state.lock();
        Ok(state.active.get(id).map(|log| log.after(after_id)).unwrap_or_default())
    }

    async fn read_finished(
        &self,
        id: &RunId,
        after_id: u64,
    ) -> Result<Option<RunLog>, LogError> {
        let state = self.state.lock();
        Ok(state.finished.get(id).map(|log| log.after(after_id)))
    }

    async fn flush(&self, id: &RunId) -> Result<(), LogError> {
        let mut state = self.state.lock();
        if let Some(log) = state.active.remove(id) {
            state.finished.insert(id.clone(), log);
        }
        Ok(())
    }

    async fn delete_run(&self, id: &RunId) -> Result<(), LogError> {
        let mut state = self.state.lock();
        state.active.remove(id);
        state.finished.remove(id);
        Ok(())
    }

    async fn delete_application(&self, id: &ApplicationId) -> Result<(), LogError> {
        let mut state = self.state.lock();
        state.active.retain(|run, _| run.application() != id);
        state.finished.retain(|run, _| run.application() != id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "log_store_tests.rs"]
mod tests;
