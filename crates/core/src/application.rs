// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application, tenant, and build identities.

use crate::job::JobType;
use crate::notification::Notifications;
use crate::version::PlatformVersion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors from identity validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid identifier {0:?}: lowercase alphanumerics and interior dashes only")]
    InvalidIdentifier(String),
    #[error("invalid serialized application id {0:?}: expected tenant.application.instance")]
    InvalidSerializedForm(String),
}

fn validate_part(part: &str) -> Result<(), IdentityError> {
    let ok = !part.is_empty()
        && !part.starts_with('-')
        && !part.ends_with('-')
        && part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if ok {
        Ok(())
    } else {
        Err(IdentityError::InvalidIdentifier(part.to_string()))
    }
}

/// Identity of one deployable application instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId {
    tenant: String,
    application: String,
    instance: String,
}

impl ApplicationId {
    pub fn new(
        tenant: impl Into<String>,
        application: impl Into<String>,
        instance: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let id = Self {
            tenant: tenant.into(),
            application: application.into(),
            instance: instance.into(),
        };
        validate_part(&id.tenant)?;
        validate_part(&id.application)?;
        validate_part(&id.instance)?;
        Ok(id)
    }

    /// Parse the dotted `tenant.application.instance` form.
    pub fn from_serialized(s: &str) -> Result<Self, IdentityError> {
        let mut parts = s.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(t), Some(a), Some(i), None) => Self::new(t, a, i),
            _ => Err(IdentityError::InvalidSerializedForm(s.to_string())),
        }
    }

    pub fn serialized_form(&self) -> String {
        format!("{}.{}.{}", self.tenant, self.application, self.instance)
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// The synthetic instance that hosts this application's test container.
    pub fn tester(&self) -> TesterId {
        TesterId(Self {
            tenant: self.tenant.clone(),
            application: self.application.clone(),
            instance: format!("{}-t", self.instance),
        })
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialized_form())
    }
}

/// Identity of the tester instance derived from an [`ApplicationId`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TesterId(ApplicationId);

impl TesterId {
    /// The tester as a deployable application id.
    pub fn id(&self) -> &ApplicationId {
        &self.0
    }
}

impl fmt::Display for TesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A source-control revision a build was made from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRevision {
    pub repository: String,
    pub branch: String,
    pub commit: String,
}

impl SourceRevision {
    pub fn new(
        repository: impl Into<String>,
        branch: impl Into<String>,
        commit: impl Into<String>,
    ) -> Self {
        Self { repository: repository.into(), branch: branch.into(), commit: commit.into() }
    }
}

/// One submitted build of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationVersion {
    pub source: SourceRevision,
    pub build_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile_version: Option<PlatformVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_time_ms: Option<u64>,
}

impl ApplicationVersion {
    pub fn new(source: SourceRevision, build_number: u64) -> Self {
        Self {
            source,
            build_number,
            author_email: None,
            compile_version: None,
            build_time_ms: None,
        }
    }

    crate::setters! {
        option {
            author_email: String,
            compile_version: PlatformVersion,
            build_time_ms: u64,
        }
    }
}

/// Persisted registry entry for one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    /// True while the application is internally deployed; cleared by unregister.
    pub registered: bool,
    pub project_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_build: Option<u64>,
    #[serde(default)]
    pub versions: Vec<ApplicationVersion>,
    #[serde(default)]
    pub notifications: Notifications,
    /// Last application build successfully deployed per production job.
    #[serde(default)]
    pub deployed_production_builds: BTreeMap<JobType, u64>,
}

impl ApplicationRecord {
    pub fn new(id: ApplicationId, project_id: u64) -> Self {
        Self {
            id,
            registered: true,
            project_id,
            latest_build: None,
            versions: Vec::new(),
            notifications: Notifications::default(),
            deployed_production_builds: BTreeMap::new(),
        }
    }

    pub fn version(&self, build_number: u64) -> Option<&ApplicationVersion> {
        self.versions.iter().find(|v| v.build_number == build_number)
    }

    /// The pruning horizon for stored packages: nothing at or above this
    /// build may be discarded. None until something reaches production.
    pub fn oldest_deployed_production_build(&self) -> Option<u64> {
        self.deployed_production_builds.values().min().copied()
    }
}

#[cfg(test)]
#[path = "application_tests.rs"]
mod tests;
