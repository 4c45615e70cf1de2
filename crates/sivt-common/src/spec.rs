//! Declared deployment spec (`config/deployment-config.yml`).
//!
//! Only the fields the orchestration reads are modelled. Cluster config
//! files referenced by `configFile` are expected to be rendered already.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::state::{ClusterRef, Extension};
use crate::{Error, Result};

pub const DEFAULT_CLOUD_NAME: &str = "tkg-cloud";
pub const DEFAULT_MGMT_SE_GROUP: &str = "tkg-management-se-group";
pub const DEFAULT_WORKLOAD_SE_GROUP: &str = "tkg-workload-se-group";
pub const DEFAULT_IPAM_PROFILE: &str = "tkg-ipam-profile";
pub const DEFAULT_PACKAGES_NAMESPACE: &str = "tanzu-package-repo-global";
pub const DEFAULT_TMC_CLUSTER_GROUP: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    pub avi: AviSpec,
    pub tkg: TkgSpec,
    #[serde(default)]
    pub integrations: IntegrationsSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AviSpec {
    /// Controller version the environment requires
    pub version: String,
    /// VM / display name of the controller
    #[serde(default)]
    pub vm_name: String,
    /// Controller FQDN or IP
    pub controller: String,
    #[serde(default = "default_avi_user")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub deployment: Option<AviDeploymentSpec>,
    #[serde(default)]
    pub cloud: AviCloudSpec,
    pub data_network: NetworkSegment,
}

fn default_avi_user() -> String {
    "admin".to_string()
}

/// Inputs for importing the controller OVA
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AviDeploymentSpec {
    pub ova_path: PathBuf,
    /// Pre-rendered govc import options
    pub options_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AviCloudSpec {
    pub name: String,
    #[serde(rename = "mgmtSEGroup")]
    pub mgmt_se_group: String,
    #[serde(rename = "workloadSEGroup")]
    pub workload_se_group: String,
    pub ipam_profile_name: String,
}

impl Default for AviCloudSpec {
    fn default() -> Self {
        Self {
            name: DEFAULT_CLOUD_NAME.to_string(),
            mgmt_se_group: DEFAULT_MGMT_SE_GROUP.to_string(),
            workload_se_group: DEFAULT_WORKLOAD_SE_GROUP.to_string(),
            ipam_profile_name: DEFAULT_IPAM_PROFILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSegment {
    pub name: String,
    /// Gateway address with prefix length, e.g. `192.168.10.1/24`
    pub gateway_cidr: String,
    pub static_ip_start: String,
    pub static_ip_end: String,
}

impl NetworkSegment {
    /// Split `gateway_cidr` into address and prefix length
    pub fn subnet(&self) -> Result<(&str, u8)> {
        let (ip, mask) = self.gateway_cidr.split_once('/').ok_or_else(|| {
            Error::configuration(format!(
                "network {}: gatewayCidr '{}' is not in address/prefix form",
                self.name, self.gateway_cidr
            ))
        })?;
        let mask = mask.parse::<u8>().ok().filter(|m| *m <= 32).ok_or_else(|| {
            Error::configuration(format!(
                "network {}: invalid prefix length '{mask}'",
                self.name
            ))
        })?;
        Ok((ip, mask))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TkgSpec {
    pub management: ManagementSpec,
    pub shared_service: SharedServiceSpec,
    #[serde(default)]
    pub workload_clusters: Vec<WorkloadClusterSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterName {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerSpec {
    #[serde(default)]
    pub repave: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementSpec {
    pub cluster: ClusterName,
    pub config_file: PathBuf,
}

/// Values for one extension install
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionSpec {
    #[serde(default)]
    pub values_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedExtensionsSpec {
    #[serde(default)]
    pub cert_manager: ExtensionSpec,
    #[serde(default)]
    pub contour: ExtensionSpec,
    #[serde(default)]
    pub harbor: ExtensionSpec,
    /// External DNS is optional; absent means it's never installed
    #[serde(default)]
    pub external_dns_rfc2136: Option<ExtensionSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadExtensionsSpec {
    #[serde(default)]
    pub cert_manager: ExtensionSpec,
    #[serde(default)]
    pub contour: ExtensionSpec,
    #[serde(default)]
    pub prometheus: ExtensionSpec,
    #[serde(default)]
    pub grafana: ExtensionSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedServiceSpec {
    pub cluster: ClusterName,
    pub config_file: PathBuf,
    #[serde(default = "default_packages_namespace")]
    pub packages_target_namespace: String,
    #[serde(default)]
    pub worker: WorkerSpec,
    #[serde(default)]
    pub extensions_spec: Option<SharedExtensionsSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadClusterSpec {
    pub cluster: ClusterName,
    pub config_file: PathBuf,
    #[serde(default = "default_packages_namespace")]
    pub packages_target_namespace: String,
    #[serde(default)]
    pub worker: WorkerSpec,
    #[serde(default)]
    pub extensions_spec: Option<WorkloadExtensionsSpec>,
}

fn default_packages_namespace() -> String {
    DEFAULT_PACKAGES_NAMESPACE.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationsSpec {
    #[serde(default)]
    pub tmc: TmcSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TmcSpec {
    #[serde(default, deserialize_with = "bool_or_string")]
    pub is_enabled: bool,
    #[serde(default)]
    pub cluster_group: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
}

impl TmcSpec {
    pub fn cluster_group(&self) -> &str {
        self.cluster_group
            .as_deref()
            .filter(|g| !g.is_empty())
            .unwrap_or(DEFAULT_TMC_CLUSTER_GROUP)
    }
}

/// Accept `true`, `"true"` and `"false"`; config files in the wild quote it
fn bool_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }
    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(s) => Ok(s.trim().eq_ignore_ascii_case("true")),
    }
}

/// What one cluster declares about itself, whichever tier it's in
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterDecl<'a> {
    pub cluster: ClusterRef,
    pub name: &'a str,
    pub config_file: &'a Path,
    pub packages_namespace: Option<&'a str>,
    pub repave: bool,
}

impl DeploymentSpec {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("failed to read spec {}: {e}", path.display()))
        })?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        let spec: DeploymentSpec = serde_yaml::from_str(data)
            .map_err(|e| Error::configuration(format!("invalid deployment spec: {e}")))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Structural checks serde can't express
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for decl in self.clusters() {
            if decl.name.trim().is_empty() {
                return Err(Error::configuration(format!("{} cluster has an empty name", decl.cluster)));
            }
            if !seen.insert(decl.name) {
                return Err(Error::configuration(format!(
                    "cluster name '{}' is declared more than once",
                    decl.name
                )));
            }
        }
        self.avi.data_network.subnet()?;
        Ok(())
    }

    pub fn workload(&self, name: &str) -> Option<&WorkloadClusterSpec> {
        self.tkg.workload_clusters.iter().find(|w| w.cluster.name == name)
    }

    pub fn workload_names(&self) -> Vec<&str> {
        self.tkg
            .workload_clusters
            .iter()
            .map(|w| w.cluster.name.as_str())
            .collect()
    }

    /// Every declared cluster: management, shared services, then workloads in order
    pub fn clusters(&self) -> Vec<ClusterDecl<'_>> {
        let mut out = vec![
            ClusterDecl {
                cluster: ClusterRef::Management,
                name: &self.tkg.management.cluster.name,
                config_file: &self.tkg.management.config_file,
                packages_namespace: None,
                repave: false,
            },
            ClusterDecl {
                cluster: ClusterRef::SharedServices,
                name: &self.tkg.shared_service.cluster.name,
                config_file: &self.tkg.shared_service.config_file,
                packages_namespace: Some(&self.tkg.shared_service.packages_target_namespace),
                repave: self.tkg.shared_service.worker.repave,
            },
        ];
        out.extend(self.tkg.workload_clusters.iter().map(|w| ClusterDecl {
            cluster: ClusterRef::Workload(w.cluster.name.clone()),
            name: &w.cluster.name,
            config_file: &w.config_file,
            packages_namespace: Some(&w.packages_target_namespace),
            repave: w.worker.repave,
        }));
        out
    }

    pub fn cluster(&self, cluster: &ClusterRef) -> Option<ClusterDecl<'_>> {
        self.clusters().into_iter().find(|d| &d.cluster == cluster)
    }

    /// Extension settings for a cluster.
    ///
    /// `None` means the extension isn't declared for that cluster: the
    /// cluster has no `extensionsSpec`, or the extension is optional and
    /// absent (external DNS).
    pub fn extension(&self, cluster: &ClusterRef, extension: Extension) -> Option<&ExtensionSpec> {
        match cluster {
            ClusterRef::Management => None,
            ClusterRef::SharedServices => {
                let ext = self.tkg.shared_service.extensions_spec.as_ref()?;
                match extension {
                    Extension::CertManager => Some(&ext.cert_manager),
                    Extension::Contour => Some(&ext.contour),
                    Extension::Harbor => Some(&ext.harbor),
                    Extension::ExternalDns => ext.external_dns_rfc2136.as_ref(),
                    _ => None,
                }
            }
            ClusterRef::Workload(name) => {
                let ext = self.workload(name)?.extensions_spec.as_ref()?;
                match extension {
                    Extension::CertManager => Some(&ext.cert_manager),
                    Extension::Contour => Some(&ext.contour),
                    Extension::Prometheus => Some(&ext.prometheus),
                    Extension::Grafana => Some(&ext.grafana),
                    _ => None,
                }
            }
        }
    }

    pub fn has_extensions_spec(&self, cluster: &ClusterRef) -> bool {
        match cluster {
            ClusterRef::Management => false,
            ClusterRef::SharedServices => self.tkg.shared_service.extensions_spec.is_some(),
            ClusterRef::Workload(name) => self
                .workload(name)
                .is_some_and(|w| w.extensions_spec.is_some()),
        }
    }
}
