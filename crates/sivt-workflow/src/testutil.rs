//! Fixtures shared by the workflow tests

use std::sync::Arc;

use tempfile::TempDir;

use sivt_common::{DeploymentSpec, DeploymentState, DesiredState, StateStore, SupportMatrix};

use crate::actuator::{
    MockClusterLifecycle, MockCommandRunner, MockExtensionActuator, MockNodeActuator,
    MockPackageActuator, MockTmcActuator,
};
use crate::alb::{MockAlbController, MockAlbInventory};
use crate::context::{Actuators, RunContext};

pub(crate) const SPEC: &str = r#"
avi:
  version: 20.1.6
  vmName: avi-controller
  controller: avi.example.com
  password: secret
  dataNetwork:
    name: tkg-data
    gatewayCidr: 192.168.20.1/24
    staticIpStart: 192.168.20.50
    staticIpEnd: 192.168.20.100
tkg:
  management:
    cluster: {name: mgmt}
    configFile: /tmp/mgmt.yml
  sharedService:
    cluster: {name: shared}
    configFile: /tmp/shared.yml
    worker: {repave: true}
    extensionsSpec:
      contour: {valuesFile: /tmp/contour-data-values.yml}
      harbor: {}
  workloadClusters:
    - cluster: {name: wl-1}
      configFile: /tmp/wl-1.yml
      worker: {repave: true}
      extensionsSpec: {}
    - cluster: {name: wl-2}
      configFile: /tmp/wl-2.yml
integrations:
  tmc:
    isEnabled: "true"
    apiToken: token
"#;

pub(crate) const MATRIX: &str = r#"
matrix:
  1.3.1:
    kubectl: v1.20.5+vmware.1
    jq: "1.6"
  1.4.0:
    kubectl: v1.21.2+vmware.1
    jq: "1.6"
    ytt: v0.34.0
upgrade_path:
  1.3.1: [1.4.0]
"#;

pub(crate) fn matrix() -> SupportMatrix {
    SupportMatrix::from_yaml(MATRIX).unwrap()
}

/// Context rooted in `dir` with a fresh committed state document
pub(crate) fn context(dir: &TempDir, target: &str) -> RunContext {
    context_with_spec(dir, target, SPEC)
}

pub(crate) fn context_with_spec(dir: &TempDir, target: &str, spec: &str) -> RunContext {
    let store = StateStore::new(dir.path().join("deployment-state").join("state.yml"));
    store.init_fresh().unwrap();
    RunContext::new(
        DeploymentSpec::from_yaml(spec).unwrap(),
        DesiredState::new(target),
        matrix(),
        store,
    )
}

/// Mutate the stored state directly, as if earlier runs had happened
pub(crate) fn seed(ctx: &RunContext, mutate: impl FnOnce(&mut DeploymentState)) {
    ctx.store
        .update("seed", |state| {
            mutate(state);
            Ok(())
        })
        .unwrap();
}

#[derive(Default)]
pub(crate) struct Mocks {
    pub clusters: MockClusterLifecycle,
    pub packages: MockPackageActuator,
    pub extensions: MockExtensionActuator,
    pub nodes: MockNodeActuator,
    pub tmc: MockTmcActuator,
    pub alb_inventory: MockAlbInventory,
    pub alb_controller: MockAlbController,
    pub commands: MockCommandRunner,
}

impl Mocks {
    pub fn build(self) -> Actuators {
        Actuators {
            clusters: Arc::new(self.clusters),
            packages: Arc::new(self.packages),
            extensions: Arc::new(self.extensions),
            nodes: Arc::new(self.nodes),
            tmc: Arc::new(self.tmc),
            alb_inventory: Arc::new(self.alb_inventory),
            alb_controller: Arc::new(self.alb_controller),
            commands: Arc::new(self.commands),
        }
    }
}
