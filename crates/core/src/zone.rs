// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deployment zones: environment × region.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How long a dev deployment lives before the config server expires it.
pub const DEV_DEPLOYMENT_TTL_MS: u64 = 4 * 60 * 60 * 1000;

/// Deployment environments, ordered least to most production-like.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Dev,
    Test,
    Staging,
    Prod,
}

impl Environment {
    /// Test environments host ephemeral verification deployments.
    pub fn is_test(self) -> bool {
        matches!(self, Environment::Test | Environment::Staging)
    }

    pub fn is_production(self) -> bool {
        self == Environment::Prod
    }

    /// Deployments here are made directly by developers, not by submission.
    pub fn is_manually_deployed(self) -> bool {
        self == Environment::Dev
    }
}

crate::simple_display! {
    Environment {
        Dev => "dev",
        Test => "test",
        Staging => "staging",
        Prod => "prod",
    }
}

/// A named deployment target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ZoneId {
    environment: Environment,
    region: String,
}

impl ZoneId {
    pub fn new(environment: Environment, region: impl Into<String>) -> Self {
        Self { environment, region: region.into() }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Deployment time-to-live enforced by the config server, if any.
    pub fn deployment_ttl_ms(&self) -> Option<u64> {
        match self.environment {
            Environment::Dev => Some(DEV_DEPLOYMENT_TTL_MS),
            _ => None,
        }
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.environment, self.region)
    }
}

#[cfg(test)]
#[path = "zone_tests.rs"]
mod tests;
