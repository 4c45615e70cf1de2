//! Deployment state: the durable record of what has actually been deployed.
//!
//! One document per environment. The on-disk keys (`avi`, `mgmt`,
//! `shared_services`, `workload_clusters`, camelCase inside) are kept
//! compatible with state files written by earlier tooling.

mod extension;
mod store;

pub use extension::Extension;
pub use store::{StateStore, FRESH_STATE_MESSAGE};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Health recorded after the last actuation that touched an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Health {
    Up,
    #[default]
    Down,
}

/// Per-extension flags. `deployed && !upgraded` after a cluster upgrade
/// means the extension still owes its own upgrade pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtensionState {
    pub deployed: bool,
    pub upgraded: bool,
}

impl ExtensionState {
    /// State written after a successful deploy or upgrade of the extension
    pub const INSTALLED: ExtensionState = ExtensionState {
        deployed: true,
        upgraded: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntegrationState {
    pub attached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Integrations {
    pub tmc: IntegrationState,
}

/// Named extension slots of a cluster
pub trait ExtensionSlots {
    /// Slots this cluster kind tracks
    fn tracked(&self) -> &'static [Extension];
    fn slot(&self, extension: Extension) -> Option<&ExtensionState>;
    fn slot_mut(&mut self, extension: Extension) -> Option<&mut ExtensionState>;

    /// Cluster-level upgrade bookkeeping: every slot owes a new upgrade pass,
    /// `deployed` is left as it was.
    fn reset_for_upgrade(&mut self) {
        for extension in self.tracked() {
            if let Some(slot) = self.slot_mut(*extension) {
                slot.upgraded = false;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedExtensions {
    pub cert_manager: ExtensionState,
    pub contour: ExtensionState,
    pub external_dns: ExtensionState,
    pub harbor: ExtensionState,
}

impl ExtensionSlots for SharedExtensions {
    fn tracked(&self) -> &'static [Extension] {
        &Extension::SHARED
    }

    fn slot(&self, extension: Extension) -> Option<&ExtensionState> {
        match extension {
            Extension::CertManager => Some(&self.cert_manager),
            Extension::Contour => Some(&self.contour),
            Extension::ExternalDns => Some(&self.external_dns),
            Extension::Harbor => Some(&self.harbor),
            _ => None,
        }
    }

    fn slot_mut(&mut self, extension: Extension) -> Option<&mut ExtensionState> {
        match extension {
            Extension::CertManager => Some(&mut self.cert_manager),
            Extension::Contour => Some(&mut self.contour),
            Extension::ExternalDns => Some(&mut self.external_dns),
            Extension::Harbor => Some(&mut self.harbor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadExtensions {
    pub cert_manager: ExtensionState,
    pub contour: ExtensionState,
    pub prometheus: ExtensionState,
    pub grafana: ExtensionState,
}

impl ExtensionSlots for WorkloadExtensions {
    fn tracked(&self) -> &'static [Extension] {
        &Extension::WORKLOAD
    }

    fn slot(&self, extension: Extension) -> Option<&ExtensionState> {
        match extension {
            Extension::CertManager => Some(&self.cert_manager),
            Extension::Contour => Some(&self.contour),
            Extension::Prometheus => Some(&self.prometheus),
            Extension::Grafana => Some(&self.grafana),
            _ => None,
        }
    }

    fn slot_mut(&mut self, extension: Extension) -> Option<&mut ExtensionState> {
        match extension {
            Extension::CertManager => Some(&mut self.cert_manager),
            Extension::Contour => Some(&mut self.contour),
            Extension::Prometheus => Some(&mut self.prometheus),
            Extension::Grafana => Some(&mut self.grafana),
            _ => None,
        }
    }
}

/// Load balancer controller or management cluster
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityInfo {
    #[serde(default)]
    pub name: String,
    pub deployed: bool,
    pub version: String,
    #[serde(default)]
    pub health: Health,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedClusterInfo {
    #[serde(default)]
    pub name: String,
    pub deployed: bool,
    pub version: String,
    #[serde(default)]
    pub upgraded_from: Option<String>,
    #[serde(default)]
    pub health: Health,
    pub extensions: SharedExtensions,
    #[serde(default)]
    pub integrations: Integrations,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadClusterInfo {
    #[serde(default)]
    pub name: String,
    pub deployed: bool,
    pub version: String,
    #[serde(default)]
    pub upgraded_from: Option<String>,
    #[serde(default)]
    pub health: Health,
    pub extensions: WorkloadExtensions,
    #[serde(default)]
    pub integrations: Integrations,
}

/// Root aggregate, one per environment
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeploymentState {
    #[serde(rename = "avi")]
    pub load_balancer: EntityInfo,
    #[serde(rename = "mgmt")]
    pub management: EntityInfo,
    pub shared_services: SharedClusterInfo,
    #[serde(default)]
    pub workload_clusters: Vec<WorkloadClusterInfo>,
}

/// Which cluster a workflow step is acting on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClusterRef {
    Management,
    SharedServices,
    Workload(String),
}

impl fmt::Display for ClusterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterRef::Management => f.write_str("management"),
            ClusterRef::SharedServices => f.write_str("shared-services"),
            ClusterRef::Workload(name) => write!(f, "workload/{name}"),
        }
    }
}

/// Snapshot of the fields pre-validation and upgrades look at
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityStatus {
    pub deployed: bool,
    pub version: String,
    pub upgraded_from: Option<String>,
    pub health: Health,
}

impl EntityStatus {
    /// Version whose configuration artifacts the running cluster was built
    /// from: the pre-upgrade version if an upgrade was recorded, else the
    /// current one.
    pub fn previous_version(&self) -> &str {
        self.upgraded_from.as_deref().unwrap_or(&self.version)
    }
}

impl DeploymentState {
    /// Everything undeployed, empty versions, no workload clusters
    pub fn fresh() -> Self {
        Self::default()
    }

    pub fn workload(&self, name: &str) -> Option<&WorkloadClusterInfo> {
        self.workload_clusters.iter().find(|w| w.name == name)
    }

    pub fn workload_mut(&mut self, name: &str) -> Option<&mut WorkloadClusterInfo> {
        self.workload_clusters.iter_mut().find(|w| w.name == name)
    }

    /// Replace the entry with the same name, or append a new one
    pub fn upsert_workload(&mut self, info: WorkloadClusterInfo) {
        match self.workload_mut(&info.name) {
            Some(existing) => *existing = info,
            None => self.workload_clusters.push(info),
        }
    }

    /// Status of a cluster. Workload clusters not yet in the document
    /// report as undeployed.
    pub fn status(&self, cluster: &ClusterRef) -> EntityStatus {
        match cluster {
            ClusterRef::Management => EntityStatus {
                deployed: self.management.deployed,
                version: self.management.version.clone(),
                upgraded_from: None,
                health: self.management.health,
            },
            ClusterRef::SharedServices => EntityStatus {
                deployed: self.shared_services.deployed,
                version: self.shared_services.version.clone(),
                upgraded_from: self.shared_services.upgraded_from.clone(),
                health: self.shared_services.health,
            },
            ClusterRef::Workload(name) => self
                .workload(name)
                .map(|w| EntityStatus {
                    deployed: w.deployed,
                    version: w.version.clone(),
                    upgraded_from: w.upgraded_from.clone(),
                    health: w.health,
                })
                .unwrap_or_default(),
        }
    }

    pub fn extensions(&self, cluster: &ClusterRef) -> Option<&dyn ExtensionSlots> {
        match cluster {
            ClusterRef::Management => None,
            ClusterRef::SharedServices => Some(&self.shared_services.extensions),
            ClusterRef::Workload(name) => self
                .workload(name)
                .map(|w| &w.extensions as &dyn ExtensionSlots),
        }
    }

    pub fn extensions_mut(&mut self, cluster: &ClusterRef) -> Option<&mut dyn ExtensionSlots> {
        match cluster {
            ClusterRef::Management => None,
            ClusterRef::SharedServices => Some(&mut self.shared_services.extensions),
            ClusterRef::Workload(name) => self
                .workload_mut(name)
                .map(|w| &mut w.extensions as &mut dyn ExtensionSlots),
        }
    }

    /// Slot state of one extension, `None` when the cluster or slot isn't tracked
    pub fn extension(&self, cluster: &ClusterRef, extension: Extension) -> Option<ExtensionState> {
        self.extensions(cluster)
            .and_then(|slots| slots.slot(extension))
            .copied()
    }

    pub fn integrations(&self, cluster: &ClusterRef) -> Option<&Integrations> {
        match cluster {
            ClusterRef::Management => None,
            ClusterRef::SharedServices => Some(&self.shared_services.integrations),
            ClusterRef::Workload(name) => self.workload(name).map(|w| &w.integrations),
        }
    }

    pub fn integrations_mut(&mut self, cluster: &ClusterRef) -> Option<&mut Integrations> {
        match cluster {
            ClusterRef::Management => None,
            ClusterRef::SharedServices => Some(&mut self.shared_services.integrations),
            ClusterRef::Workload(name) => self.workload_mut(name).map(|w| &mut w.integrations),
        }
    }

    /// Mark a cluster deployed at `version` with health UP
    pub fn record_cluster_deployed(&mut self, cluster: &ClusterRef, name: &str, version: &str) {
        match cluster {
            ClusterRef::Management => {
                self.management.deployed = true;
                self.management.name = name.to_string();
                self.management.version = version.to_string();
                self.management.health = Health::Up;
            }
            ClusterRef::SharedServices => {
                let shared = &mut self.shared_services;
                shared.deployed = true;
                shared.name = name.to_string();
                shared.version = version.to_string();
                shared.health = Health::Up;
            }
            ClusterRef::Workload(_) => {
                let mut info = self.workload(name).cloned().unwrap_or_default();
                info.name = name.to_string();
                info.deployed = true;
                info.version = version.to_string();
                info.health = Health::Up;
                self.upsert_workload(info);
            }
        }
    }

    /// Cluster-level upgrade bookkeeping: remember the old version, move to
    /// `version`, and make every extension owe its own upgrade pass.
    pub fn record_cluster_upgraded(&mut self, cluster: &ClusterRef, version: &str) {
        match cluster {
            ClusterRef::Management => {
                self.management.version = version.to_string();
                self.management.health = Health::Up;
            }
            ClusterRef::SharedServices => {
                let shared = &mut self.shared_services;
                shared.upgraded_from = Some(std::mem::replace(
                    &mut shared.version,
                    version.to_string(),
                ));
                shared.health = Health::Up;
                shared.extensions.reset_for_upgrade();
            }
            ClusterRef::Workload(name) => {
                if let Some(w) = self.workload_mut(name) {
                    w.upgraded_from = Some(std::mem::replace(&mut w.version, version.to_string()));
                    w.health = Health::Up;
                    w.extensions.reset_for_upgrade();
                }
            }
        }
    }

    /// Mark one extension slot deployed and upgraded. Returns false when the
    /// cluster doesn't track that slot.
    pub fn record_extension_installed(&mut self, cluster: &ClusterRef, extension: Extension) -> bool {
        match self
            .extensions_mut(cluster)
            .and_then(|slots| slots.slot_mut(extension))
        {
            Some(slot) => {
                *slot = ExtensionState::INSTALLED;
                true
            }
            None => false,
        }
    }

    /// Shared services and every declared workload cluster are deployed
    pub fn all_clusters_deployed<S: AsRef<str>>(&self, declared_workloads: &[S]) -> bool {
        self.shared_services.deployed
            && declared_workloads
                .iter()
                .all(|name| self.workload(name.as_ref()).is_some_and(|w| w.deployed))
    }
}
