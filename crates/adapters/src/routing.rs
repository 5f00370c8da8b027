// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Endpoint discovery through the routing layer.

use crate::config_server::DeploymentId;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// The routing layer.
#[async_trait]
pub trait Routing: Clone + Send + Sync + 'static {
    /// The deployment's endpoints per cluster. Empty until the routing
    /// layer has discovered the deployment.
    async fn cluster_endpoints(&self, deployment: &DeploymentId) -> BTreeMap<String, String>;
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
        endpoints: HashMap<DeploymentId, BTreeMap<String, String>>,
        hidden: std::collections::HashSet<DeploymentId>,
        auto: bool,
    }

    /// Scriptable routing double. By default every deployment is
    /// discoverable with a single synthetic endpoint.
    #[derive(Clone)]
    pub struct FakeRouting {
        state: Arc<Mutex<FakeState>>,
    }

    impl Default for FakeRouting {
        fn default() -> Self {
            let state = FakeState { auto: true, ..Default::default() };
            Self { state: Arc::new(Mutex::new(state)) }
        }
    }

    impl FakeRouting {
        pub fn new() -> Self {
            Self::default()
        }

        /// Turn off synthetic endpoints; only scripted ones remain.
        pub fn set_auto(&self, auto: bool) {
            self.state.lock().auto = auto;
        }

        pub fn set_endpoints(
            &self,
            deployment: &DeploymentId,
            endpoints: BTreeMap<String, String>,
        ) {
            self.state.lock().endpoints.insert(deployment.clone(), endpoints);
        }

        /// Make one deployment undiscoverable regardless of `auto`.
        pub fn hide(&self, deployment: &DeploymentId) {
            self.state.lock().hidden.insert(deployment.clone());
        }
    }

    #[async_trait]
    impl Routing for FakeRouting {
        async fn cluster_endpoints(
            &self,
            deployment: &DeploymentId,
        ) -> BTreeMap<String, String> {
            let state = self.state.lock();
            if state.hidden.contains(deployment) {
                return BTreeMap::new();
            }
            if let Some(endpoints) = state.endpoints.get(deployment) {
                return endpoints.clone();
            }
            if state.auto {
                let url = format!(
                    "https://{}.{}.endpoint.test/",
                    deployment.application.serialized_form().replace('.', "--"),
                    deployment.zone
                );
                return BTreeMap::from([("default".to_string(), url)]);
            }
            BTreeMap::new()
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeRouting;
