//! Contracts of the external actuators the workflows drive.
//!
//! Concrete adapters (tanzu/kubectl/govc processes, the kube API, the load
//! balancer REST API) live in the CLI crate. Workflows only see these
//! traits, which keeps every decision testable with mocks.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use sivt_common::{Extension, Result};

/// Role label carried by the shared services cluster
pub const TANZU_SERVICES_ROLE: &str = "tanzu-services";
/// Role label carried by the management cluster
pub const MANAGEMENT_ROLE: &str = "management";

/// One row of `tanzu cluster list --include-management-cluster`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    pub status: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, alias = "kubernetes")]
    pub kubernetes_version: Option<String>,
}

impl ClusterSummary {
    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case("running")
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeOptions {
    /// Custom BOM image tag to upgrade with
    pub bom_image_tag: Option<String>,
    pub timeout: Option<Duration>,
}

/// Cluster bring-up, upgrade and inventory
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterLifecycle: Send + Sync {
    async fn create_management(&self, name: &str, config_file: &Path) -> Result<()>;

    async fn create(&self, name: &str, config_file: &Path) -> Result<()>;

    async fn upgrade_management(&self, name: &str, options: &UpgradeOptions) -> Result<()>;

    async fn upgrade(&self, name: &str, management: &str, options: &UpgradeOptions) -> Result<()>;

    /// Every cluster the management cluster knows, itself included
    async fn list_all(&self) -> Result<Vec<ClusterSummary>>;

    async fn exists(&self, name: &str) -> Result<bool>;

    /// Apply a node-role label to a workload cluster
    async fn add_role_label(&self, name: &str, management: &str, role: &str) -> Result<()>;
}

/// Reconcile state reported for a package install or extension app
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileStatus {
    Succeeded,
    Failed(String),
    Reconciling,
}

impl ReconcileStatus {
    /// Map kapp-controller's status text
    pub fn from_description(description: &str) -> Self {
        let d = description.trim();
        if d.eq_ignore_ascii_case("Reconcile succeeded") {
            ReconcileStatus::Succeeded
        } else if d.to_ascii_lowercase().starts_with("reconcile failed") {
            ReconcileStatus::Failed(d.to_string())
        } else {
            ReconcileStatus::Reconciling
        }
    }
}

impl fmt::Display for ReconcileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileStatus::Succeeded => f.write_str("Reconcile succeeded"),
            ReconcileStatus::Failed(reason) => f.write_str(reason),
            ReconcileStatus::Reconciling => f.write_str("Reconciling"),
        }
    }
}

/// A package install request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInstall {
    pub name: String,
    pub package: String,
    pub namespace: String,
    pub version: String,
    pub values_file: Option<PathBuf>,
}

/// Carvel package management on a cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PackageActuator: Send + Sync {
    async fn list_available(&self, cluster: &str, package: &str) -> Result<Vec<String>>;

    async fn install(&self, cluster: &str, install: &PackageInstall) -> Result<()>;

    /// `None` while the install isn't visible yet
    async fn installed_status(
        &self,
        cluster: &str,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ReconcileStatus>>;
}

/// Versioned extension bundles (pre-package releases and in-place upgrades)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExtensionActuator: Send + Sync {
    /// Namespace, data-values secret and extension resource
    async fn deploy(
        &self,
        cluster: &str,
        extension: Extension,
        work_dir: &Path,
        values_file: Option<PathBuf>,
    ) -> Result<()>;

    /// Remove the TMC extension manager shipped with older bundles
    async fn delete_legacy_manager(&self, cluster: &str, work_dir: &Path) -> Result<()>;

    async fn install_kapp_controller(&self, cluster: &str, work_dir: &Path) -> Result<()>;

    async fn install_cert_manager(&self, cluster: &str, work_dir: &Path) -> Result<()>;

    /// Carry the live data-values secret forward into the new bundle layout
    async fn migrate_data_values(
        &self,
        cluster: &str,
        extension: Extension,
        from_dir: &Path,
        to_dir: &Path,
    ) -> Result<()>;

    async fn reconcile(&self, cluster: &str, extension: Extension, work_dir: &Path) -> Result<()>;

    async fn status(&self, cluster: &str, extension: Extension) -> Result<ReconcileStatus>;
}

/// A node and its creation time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: String,
    pub created: DateTime<Utc>,
}

/// Node operations on one cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodeActuator: Send + Sync {
    async fn list_nodes(&self, cluster: &str) -> Result<Vec<NodeInfo>>;

    /// Cordon and evict, ignoring daemonset pods and deleting emptyDir data
    async fn drain(&self, cluster: &str, node: &str) -> Result<()>;

    async fn delete(&self, cluster: &str, node: &str) -> Result<()>;

    /// Every node, control plane included
    async fn total(&self, cluster: &str) -> Result<usize>;

    /// Number of Ready worker nodes
    async fn ready_workers(&self, cluster: &str) -> Result<usize>;
}

/// Tanzu Mission Control attachment
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TmcActuator: Send + Sync {
    async fn attach(&self, cluster: &str, cluster_group: &str, api_token: Option<String>) -> Result<()>;
}

/// Runs a local command line and returns its stdout
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn output(&self, command_line: &str) -> Result<String>;
}
