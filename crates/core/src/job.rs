// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job types, run identities, and deployment version pairs.

use crate::application::ApplicationId;
use crate::version::PlatformVersion;
use crate::zone::{Environment, ZoneId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named deployment-and-test activity bound to one zone.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    SystemTest,
    StagingTest,
    ProductionUsEast3,
    ProductionUsWest1,
    DevUsEast1,
}

impl JobType {
    pub const ALL: [JobType; 5] = [
        JobType::SystemTest,
        JobType::StagingTest,
        JobType::ProductionUsEast3,
        JobType::ProductionUsWest1,
        JobType::DevUsEast1,
    ];

    pub fn zone(self) -> ZoneId {
        match self {
            JobType::SystemTest => ZoneId::new(Environment::Test, "us-east-1"),
            JobType::StagingTest => ZoneId::new(Environment::Staging, "us-east-3"),
            JobType::ProductionUsEast3 => ZoneId::new(Environment::Prod, "us-east-3"),
            JobType::ProductionUsWest1 => ZoneId::new(Environment::Prod, "us-west-1"),
            JobType::DevUsEast1 => ZoneId::new(Environment::Dev, "us-east-1"),
        }
    }

    pub fn environment(self) -> Environment {
        self.zone().environment()
    }

    pub fn is_production(self) -> bool {
        self.environment().is_production()
    }

    /// Whether this job runs verification tests against its deployment.
    pub fn is_test(self) -> bool {
        self.environment().is_test()
    }

    /// Whether deployments to this job are made directly by developers.
    pub fn is_manually_deployed(self) -> bool {
        self.environment().is_manually_deployed()
    }

    pub fn job_name(self) -> &'static str {
        match self {
            JobType::SystemTest => "system-test",
            JobType::StagingTest => "staging-test",
            JobType::ProductionUsEast3 => "production-us-east-3",
            JobType::ProductionUsWest1 => "production-us-west-1",
            JobType::DevUsEast1 => "dev-us-east-1",
        }
    }

    pub fn from_job_name(name: &str) -> Option<JobType> {
        JobType::ALL.into_iter().find(|t| t.job_name() == name)
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.job_name())
    }
}

/// Identity of one run: application × job × monotonically assigned number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId {
    application: ApplicationId,
    job_type: JobType,
    number: u64,
}

impl RunId {
    pub fn new(application: ApplicationId, job_type: JobType, number: u64) -> Self {
        debug_assert!(number > 0, "run numbers start at 1");
        Self { application, job_type, number }
    }

    pub fn application(&self) -> &ApplicationId {
        &self.application
    }

    pub fn job_type(&self) -> JobType {
        self.job_type
    }

    pub fn number(&self) -> u64 {
        self.number
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/#{}", self.application, self.job_type, self.number)
    }
}

/// The version pair a run deploys: a target, and for staging upgrades the
/// source it stages against. Fixed at start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versions {
    target_platform: PlatformVersion,
    target_application: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_platform: Option<PlatformVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_application: Option<u64>,
}

impl Versions {
    pub fn new(target_platform: PlatformVersion, target_application: u64) -> Self {
        Self {
            target_platform,
            target_application,
            source_platform: None,
            source_application: None,
        }
    }

    /// Record the previously deployed pair to stage the upgrade against.
    pub fn with_source(
        mut self,
        source_platform: PlatformVersion,
        source_application: u64,
    ) -> Self {
        self.source_platform = Some(source_platform);
        self.source_application = Some(source_application);
        self
    }

    pub fn target_platform(&self) -> PlatformVersion {
        self.target_platform
    }

    pub fn target_application(&self) -> u64 {
        self.target_application
    }

    pub fn source_platform(&self) -> Option<PlatformVersion> {
        self.source_platform
    }

    pub fn source_application(&self) -> Option<u64> {
        self.source_application
    }

    /// Whether the change being rolled out includes a new application build.
    pub fn includes_application_change(&self) -> bool {
        self.source_application != Some(self.target_application)
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
