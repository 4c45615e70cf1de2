//! Extension bundles applied with kubectl (pre-package TKG releases)

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use sivt_common::{Error, Extension, Result};
use sivt_workflow::actuator::{ExtensionActuator, ReconcileStatus};

use super::process;
use super::tanzu::Tanzu;
use crate::error::ActuationErrorExt;

/// Template that decodes the values document out of a data-values secret
const DATA_VALUES_TEMPLATE: &str = r#"{{index .data "values.yaml" | base64decode}}"#;

/// Directory of an extension inside a bundle's `extensions/` tree
fn bundle_subdir(extension: Extension) -> Result<&'static str> {
    match extension {
        Extension::Contour => Ok("ingress/contour"),
        Extension::ExternalDns => Ok("service-discovery/external-dns"),
        Extension::Harbor => Ok("registry/harbor"),
        Extension::Prometheus => Ok("monitoring/prometheus"),
        Extension::Grafana => Ok("monitoring/grafana"),
        Extension::CertManager => Err(Error::configuration(
            "cert-manager is installed from the bundle root, not as an extension",
        )),
    }
}

/// Files of one extension inside a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
struct BundleFiles {
    dir: PathBuf,
    app: &'static str,
}

impl BundleFiles {
    fn new(work_dir: &Path, extension: Extension) -> Result<Self> {
        Ok(Self {
            dir: work_dir.join(bundle_subdir(extension)?),
            app: extension.app(),
        })
    }

    fn namespace_role(&self) -> PathBuf {
        self.dir.join("namespace-role.yaml")
    }

    fn data_values(&self) -> PathBuf {
        self.dir.join(format!("{}-data-values.yaml", self.app))
    }

    fn data_values_example(&self) -> PathBuf {
        self.dir.join(format!("{}-data-values.yaml.example", self.app))
    }

    fn extension(&self) -> PathBuf {
        self.dir.join(format!("{}-extension.yaml", self.app))
    }

    fn secret_name(&self) -> String {
        format!("{}-data-values", self.app)
    }
}

/// [`ExtensionActuator`] over kubectl, switching to each cluster's admin
/// context before touching it
#[derive(Debug, Clone)]
pub struct KubectlExtensions {
    tanzu: Tanzu,
}

impl KubectlExtensions {
    pub fn new(tanzu: Tanzu) -> Self {
        Self { tanzu }
    }

    async fn kubectl(&self, cluster: &str, args: &[&str]) -> Result<String> {
        self.tanzu.exec(cluster, "kubectl", args).await
    }

    async fn apply(&self, cluster: &str, path: &Path) -> Result<()> {
        let path = path.to_string_lossy();
        self.kubectl(cluster, &["apply", "-f", &path]).await?;
        Ok(())
    }

    /// Create or replace the data-values secret from `values`
    async fn apply_data_values(
        &self,
        cluster: &str,
        files: &BundleFiles,
        namespace: &str,
        values: &Path,
    ) -> Result<()> {
        let from_file = format!("values.yaml={}", values.to_string_lossy());
        let secret = files.secret_name();
        let manifest = self
            .kubectl(
                cluster,
                &[
                    "create",
                    "secret",
                    "generic",
                    &secret,
                    "--from-file",
                    &from_file,
                    "-n",
                    namespace,
                    "--dry-run=client",
                    "-o",
                    "yaml",
                ],
            )
            .await?;
        let kubeconfig = self.tanzu.kubeconfig().to_string_lossy().into_owned();
        process::run_with_stdin(
            cluster,
            "kubectl",
            &["apply", "-f", "-"],
            &[("KUBECONFIG", kubeconfig.as_str())],
            &manifest,
        )
        .await?;
        debug!(cluster, secret = %secret, "Applied data values");
        Ok(())
    }
}

#[async_trait]
impl ExtensionActuator for KubectlExtensions {
    async fn deploy(
        &self,
        cluster: &str,
        extension: Extension,
        work_dir: &Path,
        values_file: Option<PathBuf>,
    ) -> Result<()> {
        let files = BundleFiles::new(work_dir, extension)?;
        self.tanzu.use_cluster(cluster).await?;
        self.apply(cluster, &files.namespace_role()).await?;

        let values = values_file.unwrap_or_else(|| files.data_values_example());
        tokio::fs::copy(&values, files.data_values())
            .await
            .actuation_err(cluster)?;
        self.apply_data_values(cluster, &files, extension.namespace(), &files.data_values())
            .await?;

        info!(cluster, extension = %extension, "Applying extension");
        self.apply(cluster, &files.extension()).await
    }

    async fn delete_legacy_manager(&self, cluster: &str, work_dir: &Path) -> Result<()> {
        self.tanzu.use_cluster(cluster).await?;
        let manifest = work_dir.join("tmc-extension-manager.yaml");
        let manifest = manifest.to_string_lossy();
        self.kubectl(cluster, &["delete", "-f", &manifest, "--ignore-not-found"])
            .await?;
        Ok(())
    }

    async fn install_kapp_controller(&self, cluster: &str, work_dir: &Path) -> Result<()> {
        self.tanzu.use_cluster(cluster).await?;
        self.apply(cluster, &work_dir.join("kapp-controller.yaml"))
            .await
    }

    async fn install_cert_manager(&self, cluster: &str, work_dir: &Path) -> Result<()> {
        self.tanzu.use_cluster(cluster).await?;
        self.apply(cluster, &work_dir.join("cert-manager")).await
    }

    async fn migrate_data_values(
        &self,
        cluster: &str,
        extension: Extension,
        from_dir: &Path,
        to_dir: &Path,
    ) -> Result<()> {
        let from = BundleFiles::new(from_dir, extension)?;
        let to = BundleFiles::new(to_dir, extension)?;
        self.tanzu.use_cluster(cluster).await?;

        let secret = from.secret_name();
        let template = format!("go-template={DATA_VALUES_TEMPLATE}");
        let values = match self
            .kubectl(
                cluster,
                &["get", "secret", &secret, "-n", extension.namespace(), "-o", &template],
            )
            .await
        {
            Ok(values) if !values.trim().is_empty() => values,
            Ok(_) | Err(_) => {
                warn!(
                    cluster,
                    extension = %extension,
                    "Live data values unavailable, using the previous bundle's file"
                );
                tokio::fs::read_to_string(from.data_values())
                    .await
                    .actuation_err(cluster)?
            }
        };

        tokio::fs::write(to.data_values(), values)
            .await
            .actuation_err(cluster)?;
        self.apply_data_values(cluster, &to, extension.namespace(), &to.data_values())
            .await
    }

    async fn reconcile(&self, cluster: &str, extension: Extension, work_dir: &Path) -> Result<()> {
        let files = BundleFiles::new(work_dir, extension)?;
        self.tanzu.use_cluster(cluster).await?;
        self.apply(cluster, &files.extension()).await
    }

    async fn status(&self, cluster: &str, extension: Extension) -> Result<ReconcileStatus> {
        self.tanzu.use_cluster(cluster).await?;
        let out = self
            .kubectl(
                cluster,
                &[
                    "get",
                    "app",
                    extension.app(),
                    "-n",
                    extension.namespace(),
                    "-o",
                    "jsonpath={.status.friendlyDescription}",
                ],
            )
            .await?;
        Ok(ReconcileStatus::from_description(&out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_files_follow_the_extension_layout() {
        let files = BundleFiles::new(
            Path::new("/tanzu/tkg-extensions-v1.3.1+vmware.1/extensions"),
            Extension::Contour,
        )
        .unwrap();
        assert_eq!(
            files.extension(),
            PathBuf::from("/tanzu/tkg-extensions-v1.3.1+vmware.1/extensions/ingress/contour/contour-extension.yaml")
        );
        assert_eq!(
            files.data_values(),
            PathBuf::from("/tanzu/tkg-extensions-v1.3.1+vmware.1/extensions/ingress/contour/contour-data-values.yaml")
        );
        assert_eq!(files.secret_name(), "contour-data-values");
    }

    #[test]
    fn monitoring_extensions_share_a_parent() {
        let root = Path::new("/x/extensions");
        let prometheus = BundleFiles::new(root, Extension::Prometheus).unwrap();
        let grafana = BundleFiles::new(root, Extension::Grafana).unwrap();
        assert_eq!(prometheus.dir.parent(), grafana.dir.parent());
        assert_eq!(
            BundleFiles::new(root, Extension::ExternalDns).unwrap().namespace_role(),
            PathBuf::from("/x/extensions/service-discovery/external-dns/namespace-role.yaml")
        );
    }

    #[test]
    fn cert_manager_has_no_bundle_dir() {
        assert!(matches!(
            bundle_subdir(Extension::CertManager),
            Err(Error::Configuration { .. })
        ));
    }
}
