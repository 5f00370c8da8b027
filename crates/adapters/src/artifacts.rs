// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The artifact store holding application and test packages.

use async_trait::async_trait;
use ro_core::{ApplicationId, ZoneId};
use thiserror::Error;

/// Errors from artifact store operations.
#[derive(Debug, Clone, Error)]
pub enum ArtifactError {
    #[error("no {kind:?} package for {application} build {build}")]
    NotFound { application: ApplicationId, build: u64, kind: PackageKind },
    #[error("no dev package for {application} in {zone}")]
    DevNotFound { application: ApplicationId, zone: ZoneId },
}

/// Which of a build's packages to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageKind {
    /// The application package itself.
    Application,
    /// The package holding the build's test code, run by the tester.
    Tests,
}

/// The artifact store.
#[async_trait]
pub trait ArtifactStore: Clone + Send + Sync + 'static {
    async fn put(
        &self,
        id: &ApplicationId,
        build: u64,
        kind: PackageKind,
        bytes: Vec<u8>,
    ) -> Result<(), ArtifactError>;

    async fn get(
        &self,
        id: &ApplicationId,
        build: u64,
        kind: PackageKind,
    ) -> Result<Vec<u8>, ArtifactError>;

    /// Store a developer-deployed package under its zone key.
    async fn put_dev(
        &self,
        id: &ApplicationId,
        zone: &ZoneId,
        bytes: Vec<u8>,
    ) -> Result<(), ArtifactError>;

    async fn get_dev(&self, id: &ApplicationId, zone: &ZoneId)
        -> Result<Vec<u8>, ArtifactError>;

    /// Discard packages with builds older than `oldest_kept`.
    async fn prune(&self, id: &ApplicationId, oldest_kept: u64) -> Result<(), ArtifactError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeState {
        packages: HashMap<(ApplicationId, u64, PackageKind), Vec<u8>>,
        dev_packages: HashMap<(ApplicationId, ZoneId), Vec<u8>>,
        pruned: Vec<(ApplicationId, u64)>,
    }

    /// In-memory artifact store double.
    #[derive(Clone, Default)]
    pub struct FakeArtifactStore {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeArtifactStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Builds with a stored application package, ascending.
        pub fn stored_builds(&self, id: &ApplicationId) -> Vec<u64> {
            let mut builds: Vec<u64> = self
                .state
                .lock()
                .packages
                .keys()
                .filter(|(app, _, kind)| app == id && *kind == PackageKind::Application)
                .map(|(_, build, _)| *build)
                .collect();
            builds.sort_unstable();
            builds
        }

        pub fn prune_calls(&self) -> Vec<(ApplicationId, u64)> {
            self.state.lock().pruned.clone()
        }
    }

    #[async_trait]
    impl ArtifactStore for FakeArtifactStore {
        async fn put(
            &self,
            id: &ApplicationId,
            build: u64,
            kind: PackageKind,
            bytes: Vec<u8>,
        ) -> Result<(), ArtifactError> {
            self.state.lock().packages.insert((id.clone(), build, kind), bytes);
            Ok(())
        }

        async fn get(
            &self,
            id: &ApplicationId,
            build: u64,
            kind: PackageKind,
        ) -> Result<Vec<u8>, ArtifactError> {
            self.state.lock().packages.get(&(id.clone(), build, kind)).cloned().ok_or(
                ArtifactError::NotFound { application: id.clone(), build, kind },
            )
        }

        async fn put_dev(
            &self,
            id: &ApplicationId,
            zone: &ZoneId,
            bytes: Vec<u8>,
        ) -> Result<(), ArtifactError> {
            self.state.lock().dev_packages.insert((id.clone(), zone.clone()), bytes);
            Ok(())
        }

        async fn get_dev(
            &self,
            id: &ApplicationId,
            zone: &ZoneId,
        ) -> Result<Vec<u8>, ArtifactError> {
            self.state.lock().dev_packages.get(&(id.clone(), zone.clone())).cloned().ok_or(
                ArtifactError::DevNotFound { application: id.clone(), zone: zone.clone() },
            )
        }

        async fn prune(
            &self,
            id: &ApplicationId,
            oldest_kept: u64,
        ) -> Result<(), ArtifactError> {
            let mut state = self.state.lock();
            state
                .packages
                .retain(|(app, build, _), _| app != id || *build >= oldest_kept);
            state.pruned.push((id.clone(), oldest_kept));
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeArtifactStore;
