// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ro-adapters: contracts for Rollout's external collaborators.
//!
//! The deployment and test subsystems are external; this crate holds the
//! interfaces the runner consumes, plus scriptable `Fake*` doubles behind
//! the `test-support` feature.

pub mod artifacts;
pub mod config_server;
pub mod mailer;
pub mod routing;
pub mod tester;

pub use artifacts::{ArtifactError, ArtifactStore, PackageKind};
pub use config_server::{
    ConfigServer, ConfigServerError, DeploymentId, DeploymentInfo, ErrorCode, NodeInfo,
    PrepareResponse, RefeedAction, RestartAction, ServiceConvergence, ServiceState,
    ServiceStatus,
};
pub use mailer::{Mail, Mailer, MailerError};
pub use routing::Routing;
pub use tester::{Suite, TesterCloud, TesterCloudError, TesterStatus};

#[cfg(any(test, feature = "test-support"))]
pub use artifacts::FakeArtifactStore;
#[cfg(any(test, feature = "test-support"))]
pub use config_server::FakeConfigServer;
#[cfg(any(test, feature = "test-support"))]
pub use mailer::FakeMailer;
#[cfg(any(test, feature = "test-support"))]
pub use routing::FakeRouting;
#[cfg(any(test, feature = "test-support"))]
pub use tester::FakeTesterCloud;
