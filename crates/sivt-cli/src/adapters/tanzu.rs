//! `tanzu` CLI adapter: cluster lifecycle and Carvel packages

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use sivt_common::{Error, Result};
use sivt_workflow::actuator::{
    ClusterLifecycle, ClusterSummary, PackageActuator, PackageInstall, ReconcileStatus,
    UpgradeOptions,
};

use super::process;
use crate::error::ActuationErrorExt;

/// Role label key applied to workload clusters
const ROLE_LABEL_PREFIX: &str = "cluster-role.tkg.tanzu.vmware.com";

/// Shared handle on the kubeconfig every tanzu and kubectl call runs against
#[derive(Debug, Clone)]
pub struct Tanzu {
    kubeconfig: PathBuf,
    management: String,
}

impl Tanzu {
    pub fn new(kubeconfig: impl Into<PathBuf>, management: impl Into<String>) -> Self {
        Self {
            kubeconfig: kubeconfig.into(),
            management: management.into(),
        }
    }

    pub fn kubeconfig(&self) -> &Path {
        &self.kubeconfig
    }

    /// Admin context name written by `tanzu cluster kubeconfig get --admin`
    pub fn context(cluster: &str) -> String {
        format!("{cluster}-admin@{cluster}")
    }

    fn kubeconfig_str(&self) -> Result<&str> {
        self.kubeconfig.to_str().ok_or_else(|| {
            Error::configuration(format!(
                "kubeconfig path {} is not valid UTF-8",
                self.kubeconfig.display()
            ))
        })
    }

    /// Run `program` with KUBECONFIG pointing at the environment's kubeconfig
    pub async fn exec(&self, entity: &str, program: &str, args: &[&str]) -> Result<String> {
        let kubeconfig = self.kubeconfig_str()?;
        process::run_with_env(entity, program, args, &[("KUBECONFIG", kubeconfig)]).await
    }

    async fn tanzu(&self, entity: &str, args: &[&str]) -> Result<String> {
        self.exec(entity, "tanzu", args).await
    }

    /// Merge admin credentials for `cluster` into the kubeconfig
    pub async fn fetch_credentials(&self, cluster: &str) -> Result<()> {
        if cluster == self.management {
            self.tanzu(cluster, &["management-cluster", "kubeconfig", "get", "--admin"])
                .await?;
        } else {
            self.login(cluster).await?;
            self.tanzu(cluster, &["cluster", "kubeconfig", "get", cluster, "--admin"])
                .await?;
        }
        Ok(())
    }

    /// Fetch credentials and make `cluster` the current kube context
    pub async fn use_cluster(&self, cluster: &str) -> Result<()> {
        self.fetch_credentials(cluster).await?;
        let context = Self::context(cluster);
        self.exec(cluster, "kubectl", &["config", "use-context", &context])
            .await?;
        debug!(cluster, context = %context, "Switched kube context");
        Ok(())
    }

    async fn login(&self, entity: &str) -> Result<()> {
        self.tanzu(entity, &["login", "--server", &self.management])
            .await
            .map(|_| ())
    }
}

fn upgrade_env(options: &UpgradeOptions) -> Vec<(&'static str, String)> {
    options
        .bom_image_tag
        .as_ref()
        .map(|tag| vec![("TKG_BOM_CUSTOM_IMAGE_TAG", tag.clone())])
        .unwrap_or_default()
}

fn timeout_arg(options: &UpgradeOptions) -> Option<String> {
    options.timeout.map(|t| format!("{}s", t.as_secs()))
}

impl Tanzu {
    async fn upgrade_with(&self, entity: &str, args: &[&str], options: &UpgradeOptions) -> Result<()> {
        let timeout = timeout_arg(options);
        let mut args = args.to_vec();
        if let Some(timeout) = timeout.as_deref() {
            args.extend(["--timeout", timeout]);
        }
        let kubeconfig = self.kubeconfig_str()?;
        let extra = upgrade_env(options);
        let mut env: Vec<(&str, &str)> = vec![("KUBECONFIG", kubeconfig)];
        env.extend(extra.iter().map(|(k, v)| (*k, v.as_str())));
        process::run_with_env(entity, "tanzu", &args, &env).await?;
        Ok(())
    }
}

#[async_trait]
impl ClusterLifecycle for Tanzu {
    async fn create_management(&self, name: &str, config_file: &Path) -> Result<()> {
        let file = config_file.to_string_lossy();
        info!(cluster = name, "Creating management cluster");
        self.tanzu(name, &["management-cluster", "create", "--file", &file, "-v", "9"])
            .await?;
        Ok(())
    }

    async fn create(&self, name: &str, config_file: &Path) -> Result<()> {
        let file = config_file.to_string_lossy();
        self.login(name).await?;
        info!(cluster = name, "Creating cluster");
        self.tanzu(name, &["cluster", "create", "--file", &file, "-v", "9"])
            .await?;
        Ok(())
    }

    async fn upgrade_management(&self, name: &str, options: &UpgradeOptions) -> Result<()> {
        self.login(name).await?;
        self.upgrade_with(name, &["management-cluster", "upgrade", "--yes"], options)
            .await
    }

    async fn upgrade(&self, name: &str, _management: &str, options: &UpgradeOptions) -> Result<()> {
        self.login(name).await?;
        self.upgrade_with(name, &["cluster", "upgrade", name, "--yes"], options)
            .await
    }

    async fn list_all(&self) -> Result<Vec<ClusterSummary>> {
        let out = self
            .tanzu(
                &self.management,
                &["cluster", "list", "--include-management-cluster", "--output", "json"],
            )
            .await?;
        parse_cluster_list(&out).actuation_err(&self.management)
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        // cluster list needs a management cluster to log in to
        if name == self.management {
            return Ok(self.tanzu(name, &["management-cluster", "get"]).await.is_ok());
        }
        Ok(self.list_all().await?.iter().any(|c| c.name == name))
    }

    async fn add_role_label(&self, name: &str, management: &str, role: &str) -> Result<()> {
        self.use_cluster(management).await?;
        let resource = format!("cluster.cluster.x-k8s.io/{name}");
        let label = format!("{ROLE_LABEL_PREFIX}/{role}=");
        self.exec(name, "kubectl", &["label", &resource, &label, "--overwrite=true"])
            .await?;
        Ok(())
    }
}

fn parse_cluster_list(out: &str) -> serde_json::Result<Vec<ClusterSummary>> {
    if out.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(out)
}

#[derive(Debug, Deserialize)]
struct AvailablePackage {
    version: String,
}

#[derive(Debug, Deserialize)]
struct InstalledPackage {
    #[serde(default)]
    status: String,
}

#[async_trait]
impl PackageActuator for Tanzu {
    async fn list_available(&self, cluster: &str, package: &str) -> Result<Vec<String>> {
        self.use_cluster(cluster).await?;
        let out = self
            .tanzu(cluster, &["package", "available", "list", package, "-A", "-o", "json"])
            .await?;
        let available: Vec<AvailablePackage> = serde_json::from_str(&out).actuation_err(cluster)?;
        Ok(available.into_iter().map(|p| p.version).collect())
    }

    async fn install(&self, cluster: &str, install: &PackageInstall) -> Result<()> {
        self.use_cluster(cluster).await?;
        let values = install
            .values_file
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        let mut args = vec![
            "package",
            "install",
            install.name.as_str(),
            "--package-name",
            install.package.as_str(),
            "--namespace",
            install.namespace.as_str(),
            "--version",
            install.version.as_str(),
        ];
        if let Some(values) = values.as_deref() {
            args.extend(["--values-file", values]);
        }
        info!(cluster, package = %install.package, version = %install.version, "Installing package");
        self.tanzu(cluster, &args).await?;
        Ok(())
    }

    async fn installed_status(
        &self,
        cluster: &str,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ReconcileStatus>> {
        self.use_cluster(cluster).await?;
        let out = match self
            .tanzu(
                cluster,
                &["package", "installed", "get", name, "--namespace", namespace, "-o", "json"],
            )
            .await
        {
            Ok(out) => out,
            Err(e) if e.to_string().contains("not found") => return Ok(None),
            Err(e) => return Err(e),
        };
        let installed: Vec<InstalledPackage> = serde_json::from_str(&out).actuation_err(cluster)?;
        Ok(installed
            .first()
            .map(|p| ReconcileStatus::from_description(&p.status)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parses_cluster_list_json() {
        let out = r#"[
            {"name": "mgmt", "namespace": "tkg-system", "status": "running",
             "plan": "dev", "kubernetes": "v1.21.2+vmware.1", "roles": ["management"]},
            {"name": "shared", "namespace": "default", "status": "createStalled",
             "kubernetes": "v1.21.2+vmware.1", "roles": ["tanzu-services"]}
        ]"#;
        let clusters = parse_cluster_list(out).unwrap();
        assert_eq!(clusters.len(), 2);
        assert!(clusters[0].is_running());
        assert!(!clusters[1].is_running());
        assert!(clusters[1].has_role("tanzu-services"));
        assert_eq!(
            clusters[0].kubernetes_version.as_deref(),
            Some("v1.21.2+vmware.1")
        );
        assert!(parse_cluster_list("\n").unwrap().is_empty());
    }

    #[test]
    fn upgrade_options_become_flags_and_env() {
        let options = UpgradeOptions {
            bom_image_tag: Some("v1.4.0-patch1".to_string()),
            timeout: Some(Duration::from_secs(3600)),
        };
        assert_eq!(timeout_arg(&options).as_deref(), Some("3600s"));
        assert_eq!(
            upgrade_env(&options),
            vec![("TKG_BOM_CUSTOM_IMAGE_TAG", "v1.4.0-patch1".to_string())]
        );
        assert!(upgrade_env(&UpgradeOptions::default()).is_empty());
    }

    #[test]
    fn admin_context_name() {
        assert_eq!(Tanzu::context("wl-1"), "wl-1-admin@wl-1");
    }
}
