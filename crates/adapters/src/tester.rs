// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tester cloud contract: the external harness that runs test code
//! against a deployed application.

use async_trait::async_trait;
use ro_core::{JobType, LogEntry};
use thiserror::Error;

/// Errors from tester cloud calls.
#[derive(Debug, Clone, Error)]
pub enum TesterCloudError {
    #[error("tester call failed: {0}")]
    CallFailed(String),
}

/// What the tester reports about its current test execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TesterStatus {
    NotStarted,
    Running,
    Success,
    Failure,
    Error,
}

/// Which test suite a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suite {
    System,
    Staging,
    Production,
}

impl Suite {
    pub fn of(job: JobType) -> Suite {
        match job {
            JobType::SystemTest => Suite::System,
            JobType::StagingTest => Suite::Staging,
            _ => Suite::Production,
        }
    }
}

ro_core::simple_display! {
    Suite {
        System => "system",
        Staging => "staging",
        Production => "production",
    }
}

/// The tester cloud.
#[async_trait]
pub trait TesterCloud: Clone + Send + Sync + 'static {
    /// Whether the tester container is up and accepting work.
    async fn ready(&self, url: &str) -> bool;

    async fn start_tests(
        &self,
        url: &str,
        suite: Suite,
        config: serde_json::Value,
    ) -> Result<(), TesterCloudError>;

    async fn status(&self, url: &str) -> Result<TesterStatus, TesterCloudError>;

    /// Test log entries with ids after `after_id`.
    async fn log(&self, url: &str, after_id: u64) -> Result<Vec<LogEntry>, TesterCloudError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// One recorded start_tests call.
    #[derive(Debug, Clone)]
    pub struct StartedTests {
        pub url: String,
        pub suite: Suite,
        pub config: serde_json::Value,
    }

    #[derive(Default)]
    struct FakeState {
        ready: bool,
        status: Option<TesterStatus>,
        started: Vec<StartedTests>,
        entries: Vec<LogEntry>,
        fail_next_start: bool,
    }

    /// Scriptable tester cloud double.
    #[derive(Clone)]
    pub struct FakeTesterCloud {
        state: Arc<Mutex<FakeState>>,
    }

    impl Default for FakeTesterCloud {
        fn default() -> Self {
            let state = FakeState { ready: true, ..Default::default() };
            Self { state: Arc::new(Mutex::new(state)) }
        }
    }

    impl FakeTesterCloud {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_ready(&self, ready: bool) {
            self.state.lock().ready = ready;
        }

        pub fn set_status(&self, status: TesterStatus) {
            self.state.lock().status = Some(status);
        }

        pub fn fail_next_start(&self) {
            self.state.lock().fail_next_start = true;
        }

        /// Seed test log entries the runner will fetch.
        pub fn add_log_entries(&self, entries: Vec<LogEntry>) {
            self.state.lock().entries.extend(entries);
        }

        pub fn started(&self) -> Vec<StartedTests> {
            self.state.lock().started.clone()
        }
    }

    #[async_trait]
    impl TesterCloud for FakeTesterCloud {
        async fn ready(&self, _url: &str) -> bool {
            self.state.lock().ready
        }

        async fn start_tests(
            &self,
            url: &str,
            suite: Suite,
            config: serde_json::Value,
        ) -> Result<(), TesterCloudError> {
            let mut state = self.state.lock();
            if std::mem::take(&mut state.fail_next_start) {
                return Err(TesterCloudError::CallFailed("scripted failure".to_string()));
            }
            state.started.push(StartedTests { url: url.to_string(), suite, config });
            if state.status.is_none() || state.status == Some(TesterStatus::NotStarted) {
                state.status = Some(TesterStatus::Running);
            }
            Ok(())
        }

        async fn status(&self, _url: &str) -> Result<TesterStatus, TesterCloudError> {
            Ok(self.state.lock().status.unwrap_or(TesterStatus::NotStarted))
        }

        async fn log(
            &self,
            _url: &str,
            after_id: u64,
        ) -> Result<Vec<LogEntry>, TesterCloudError> {
            Ok(self
                .state
                .lock()
                .entries
                .iter()
                .filter(|e| e.id > after_id)
                .cloned()
                .collect())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTesterCloud, StartedTests};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suite_follows_job_type() {
        assert_eq!(Suite::of(JobType::SystemTest), Suite::System);
        assert_eq!(Suite::of(JobType::StagingTest), Suite::Staging);
        assert_eq!(Suite::of(JobType::ProductionUsEast3), Suite::Production);
        assert_eq!(Suite::of(JobType::DevUsEast1), Suite::Production);
    }

    #[tokio::test]
    async fn starting_tests_moves_status_to_running() {
        let cloud = FakeTesterCloud::new();
        assert_eq!(cloud.status("url").await.unwrap(), TesterStatus::NotStarted);

        cloud
            .start_tests("url", Suite::System, serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(cloud.status("url").await.unwrap(), TesterStatus::Running);
        assert_eq!(cloud.started().len(), 1);

        cloud.set_status(TesterStatus::Success);
        assert_eq!(cloud.status("url").await.unwrap(), TesterStatus::Success);
    }

    #[tokio::test]
    async fn log_filters_by_entry_id() {
        let cloud = FakeTesterCloud::new();
        cloud.add_log_entries(vec![
            LogEntry::new(1, 0, ro_core::LogLevel::Info, "one"),
            LogEntry::new(2, 0, ro_core::LogLevel::Info, "two"),
        ]);
        let entries = cloud.log("url", 1).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "two");
    }
}
