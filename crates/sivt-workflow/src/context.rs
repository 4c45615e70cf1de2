//! Everything one invocation needs, passed explicitly through the call chain.

use std::sync::Arc;

use tracing::debug;

use sivt_common::{
    ClusterRef, DeploymentSpec, DesiredState, EntityStatus, Result, RootLayout, StateStore,
    SupportMatrix,
};

use crate::actuator::{
    ClusterLifecycle, CommandRunner, ExtensionActuator, NodeActuator, PackageActuator, TmcActuator,
};
use crate::alb::{AlbController, AlbInventory};
use crate::prevalidate::{self, Decision};

/// Inputs of a run: declared spec, desired target, support matrix and the
/// state store. Immutable for the lifetime of the invocation except for the
/// state document, which is only touched through `store`.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub spec: DeploymentSpec,
    pub desired: DesiredState,
    pub matrix: SupportMatrix,
    pub store: StateStore,
}

impl RunContext {
    pub fn new(
        spec: DeploymentSpec,
        desired: DesiredState,
        matrix: SupportMatrix,
        store: StateStore,
    ) -> Self {
        Self {
            spec,
            desired,
            matrix,
            store,
        }
    }

    /// Read the deployment config, desired state and support matrix from `layout`
    pub fn load(layout: &RootLayout) -> Result<Self> {
        let spec = DeploymentSpec::load(&layout.spec())?;
        let desired = DesiredState::load(&layout.desired_state())?;
        let matrix = SupportMatrix::load(&layout.support_matrix())?;
        debug!(
            root = %layout.root().display(),
            target = %desired.target_version(),
            "Loaded run context"
        );
        Ok(Self::new(
            spec,
            desired,
            matrix,
            StateStore::new(layout.state()),
        ))
    }

    pub fn target_version(&self) -> &str {
        self.desired.target_version()
    }

    pub fn management_name(&self) -> &str {
        &self.spec.tkg.management.cluster.name
    }

    /// Recorded status of `cluster`, read fresh from the store
    pub fn status(&self, cluster: &ClusterRef) -> Result<EntityStatus> {
        Ok(self.store.load()?.status(cluster))
    }

    /// Run the version pre-validation for `cluster` against the desired target
    pub fn prevalidate(&self, cluster: &ClusterRef) -> Result<Decision> {
        let status = self.status(cluster)?;
        let decision = prevalidate::validate(&status, self.target_version(), &self.matrix);
        debug!(cluster = %cluster, current = %status.version, decision = ?decision, "Pre-validated");
        Ok(decision)
    }
}

/// Handles to the external actuators
#[derive(Clone)]
pub struct Actuators {
    pub clusters: Arc<dyn ClusterLifecycle>,
    pub packages: Arc<dyn PackageActuator>,
    pub extensions: Arc<dyn ExtensionActuator>,
    pub nodes: Arc<dyn NodeActuator>,
    pub tmc: Arc<dyn TmcActuator>,
    pub alb_inventory: Arc<dyn AlbInventory>,
    pub alb_controller: Arc<dyn AlbController>,
    pub commands: Arc<dyn CommandRunner>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::testutil::{MATRIX, SPEC};

    #[test]
    fn load_resolves_every_document_under_the_root() {
        let dir = TempDir::new().unwrap();
        let layout = RootLayout::new(dir.path());
        for (path, body) in [
            (layout.spec(), SPEC),
            (layout.desired_state(), "version:\n  tkg: 1.4.0\n"),
            (layout.support_matrix(), MATRIX),
        ] {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, body).unwrap();
        }

        let ctx = RunContext::load(&layout).unwrap();
        assert_eq!(ctx.target_version(), "1.4.0");
        assert_eq!(ctx.management_name(), "mgmt");
        assert_eq!(ctx.store.path(), layout.state().as_path());
    }
}
