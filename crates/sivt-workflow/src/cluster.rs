//! Deploy-side workflows for a single cluster: the cluster itself, its
//! extensions and its TMC attachment. Every step is an [`ensure`] pass.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use sivt_common::version::{self, PACKAGE_FLOW_MIN_VERSION};
use sivt_common::{
    ClusterRef, DeploymentState, Error, Extension, PollBudget, PollResult, Result,
};

use crate::actuator::{PackageInstall, ReconcileStatus, TANZU_SERVICES_ROLE};
use crate::context::{Actuators, RunContext};
use crate::ensure::{ensure, Deployable, Outcome};
use crate::extensions::ExtensionDirs;
use crate::prevalidate::Decision;
use crate::task::{Task, TaskReport};

/// Package install / extension reconcile convergence budget
pub const RECONCILE_BUDGET: PollBudget =
    PollBudget::new(Duration::from_secs(900), Duration::from_secs(20));

/// Workflows bound to one run
pub struct ClusterWorkflow<'a> {
    ctx: &'a RunContext,
    act: &'a Actuators,
}

impl<'a> ClusterWorkflow<'a> {
    pub fn new(ctx: &'a RunContext, act: &'a Actuators) -> Self {
        Self { ctx, act }
    }

    /// Fails the task on a pre-validation failure. Skip and proceed both let
    /// the task run; the ensure pass does its own skip check.
    fn gate(&self, cluster: &ClusterRef) -> Result<()> {
        match self.ctx.prevalidate(cluster)? {
            Decision::Fail(reason) => Err(Error::configuration(reason)),
            Decision::Skip => {
                info!(cluster = %cluster, version = %self.ctx.target_version(), "Cluster is already on the desired version");
                Ok(())
            }
            Decision::Proceed => Ok(()),
        }
    }

    fn cluster_name(&self, cluster: &ClusterRef) -> Result<String> {
        self.ctx
            .spec
            .cluster(cluster)
            .map(|d| d.name.to_string())
            .ok_or_else(|| Error::configuration(format!("{cluster} cluster is not declared")))
    }

    pub async fn deploy_cluster(&self, cluster: &ClusterRef) -> TaskReport {
        let entity = cluster.to_string();
        if let Err(e) = self.gate(cluster) {
            return TaskReport::from_result(Task::DeployCluster, entity, Err(e));
        }
        let Some(decl) = self.ctx.spec.cluster(cluster) else {
            let err = Error::configuration(format!("{cluster} cluster is not declared"));
            return TaskReport::from_result(Task::DeployCluster, entity, Err(err));
        };

        let item = ClusterDeploy {
            ctx: self.ctx,
            act: self.act,
            cluster: cluster.clone(),
            name: decl.name.to_string(),
            config_file: decl.config_file.to_path_buf(),
        };
        TaskReport::new(Task::DeployCluster, decl.name, ensure(&self.ctx.store, &item).await)
    }

    pub async fn deploy_extension(&self, cluster: &ClusterRef, extension: Extension) -> TaskReport {
        let task = Task::Deploy(extension);
        let name = match self.gate(cluster).and_then(|_| self.cluster_name(cluster)) {
            Ok(name) => name,
            Err(e) => return TaskReport::from_result(task, cluster.to_string(), Err(e)),
        };
        let entity = format!("{name}/{}", extension.app());

        // cert-manager is a dependency of the others and installs without an extensions block
        if extension != Extension::CertManager && !self.ctx.spec.has_extensions_spec(cluster) {
            warn!(cluster = %name, "extensionsSpec not found, no extensions/packages will be installed");
            return TaskReport::new(task, entity, Outcome::Skipped);
        }
        let values_file = match self.ctx.spec.extension(cluster, extension) {
            Some(ext) => ext.values_file.clone(),
            None if extension == Extension::CertManager => None,
            None => {
                info!(cluster = %name, extension = %extension, "Spec not found, skipping installation");
                return TaskReport::new(task, entity, Outcome::Skipped);
            }
        };

        let item = match ExtensionDeploy::new(self.ctx, self.act, cluster, &name, extension, values_file) {
            Ok(item) => item,
            Err(e) => return TaskReport::from_result(task, entity, Err(e)),
        };
        TaskReport::new(task, entity, ensure(&self.ctx.store, &item).await)
    }

    pub async fn attach_tmc(&self, cluster: &ClusterRef) -> TaskReport {
        let task = Task::AttachClusterToTmc;
        let tmc = &self.ctx.spec.integrations.tmc;
        let name = match self.cluster_name(cluster) {
            Ok(name) => name,
            Err(e) => return TaskReport::from_result(task, cluster.to_string(), Err(e)),
        };
        if !tmc.is_enabled {
            info!(cluster = %name, "Integration of cluster with TMC is not enabled, skipping");
            return TaskReport::new(task, name, Outcome::Skipped);
        }

        let item = TmcAttach {
            act: self.act,
            cluster: cluster.clone(),
            name: name.clone(),
            cluster_group: tmc.cluster_group().to_string(),
            api_token: tmc.api_token.clone(),
        };
        TaskReport::new(task, name, ensure(&self.ctx.store, &item).await)
    }
}

/// Create the cluster if the state doesn't already record it
struct ClusterDeploy<'a> {
    ctx: &'a RunContext,
    act: &'a Actuators,
    cluster: ClusterRef,
    name: String,
    config_file: PathBuf,
}

#[async_trait]
impl Deployable for ClusterDeploy<'_> {
    fn entity(&self) -> String {
        self.name.clone()
    }

    fn is_satisfied(&self, state: &DeploymentState) -> Result<bool> {
        let status = state.status(&self.cluster);
        if status.deployed {
            info!(cluster = %self.name, version = %status.version, "Cluster is deployed");
        }
        Ok(status.deployed)
    }

    async fn actuate(&self) -> Result<()> {
        let clusters = &self.act.clusters;
        // a run killed after create leaves the cluster without a state record
        let present = clusters.exists(&self.name).await?;
        if present {
            warn!(cluster = %self.name, "Cluster already exists, skipping creation");
        }
        match self.cluster {
            ClusterRef::Management => {
                if !present {
                    clusters
                        .create_management(&self.name, &self.config_file)
                        .await?;
                }
                return Ok(());
            }
            ClusterRef::SharedServices => {
                if !present {
                    clusters.create(&self.name, &self.config_file).await?;
                }
                ensure_services_label(self.act, &self.name, self.ctx.management_name()).await?;
            }
            ClusterRef::Workload(_) => {
                if !present {
                    clusters.create(&self.name, &self.config_file).await?;
                }
            }
        }

        // releases before the package flow need kapp-controller installed by hand
        if version::is_below(self.ctx.target_version(), PACKAGE_FLOW_MIN_VERSION)? {
            let dirs = ExtensionDirs::for_version(self.ctx.target_version())?;
            self.act
                .extensions
                .install_kapp_controller(&self.name, &dirs.dir)
                .await?;
        }
        Ok(())
    }

    fn record(&self, state: &mut DeploymentState) -> Result<()> {
        state.record_cluster_deployed(&self.cluster, &self.name, self.ctx.target_version());
        Ok(())
    }

    fn commit_message(&self) -> String {
        match self.cluster {
            ClusterRef::Management => {
                format!("Successful management cluster deployment [{}]", self.name)
            }
            ClusterRef::SharedServices => {
                format!("Successful Shared Cluster deployment [{}]", self.name)
            }
            ClusterRef::Workload(_) => {
                format!("Successful workload cluster deployment [{}]", self.name)
            }
        }
    }
}

/// Add the `tanzu-services` role if missing and check it stuck
pub(crate) async fn ensure_services_label(act: &Actuators, name: &str, management: &str) -> Result<()> {
    if has_services_role(act, name).await? {
        info!(cluster = %name, "Services label already set");
        return Ok(());
    }
    act.clusters
        .add_role_label(name, management, TANZU_SERVICES_ROLE)
        .await?;
    if !has_services_role(act, name).await? {
        return Err(Error::actuation(
            name,
            format!("Services label not set for cluster: {name}"),
        ));
    }
    debug!(cluster = %name, "Services label set");
    Ok(())
}

async fn has_services_role(act: &Actuators, name: &str) -> Result<bool> {
    Ok(act
        .clusters
        .list_all()
        .await?
        .iter()
        .any(|c| c.name == name && c.has_role(TANZU_SERVICES_ROLE)))
}

/// Install one extension, as a package or a legacy extension bundle
struct ExtensionDeploy<'a> {
    act: &'a Actuators,
    cluster: ClusterRef,
    cluster_name: String,
    extension: Extension,
    values_file: Option<PathBuf>,
    packages_namespace: String,
    flow: Flow,
}

enum Flow {
    Package,
    Legacy(ExtensionDirs),
}

impl<'a> ExtensionDeploy<'a> {
    fn new(
        ctx: &'a RunContext,
        act: &'a Actuators,
        cluster: &ClusterRef,
        cluster_name: &str,
        extension: Extension,
        values_file: Option<PathBuf>,
    ) -> Result<Self> {
        let target = ctx.target_version();
        let flow = if version::is_below(target, PACKAGE_FLOW_MIN_VERSION)? {
            Flow::Legacy(ExtensionDirs::for_version(target)?)
        } else {
            Flow::Package
        };
        let packages_namespace = ctx
            .spec
            .cluster(cluster)
            .and_then(|d| d.packages_namespace.map(str::to_string))
            .unwrap_or_else(|| sivt_common::spec::DEFAULT_PACKAGES_NAMESPACE.to_string());
        Ok(Self {
            act,
            cluster: cluster.clone(),
            cluster_name: cluster_name.to_string(),
            extension,
            values_file,
            packages_namespace,
            flow,
        })
    }

    async fn install_package(&self) -> Result<()> {
        let packages = &self.act.packages;
        let available = packages
            .list_available(&self.cluster_name, self.extension.package())
            .await?;
        let version = version::highest(&available).ok_or_else(|| {
            Error::actuation(
                self.extension.app(),
                format!("no available version of {}", self.extension.package()),
            )
        })?;
        info!(
            cluster = %self.cluster_name,
            package = %self.extension.package(),
            version,
            "Installing package"
        );
        packages
            .install(
                &self.cluster_name,
                &PackageInstall {
                    name: self.extension.app().to_string(),
                    package: self.extension.package().to_string(),
                    namespace: self.packages_namespace.clone(),
                    version: version.to_string(),
                    values_file: self.values_file.clone(),
                },
            )
            .await
    }

    fn is_cert_manager_bundle(&self) -> bool {
        self.extension == Extension::CertManager && matches!(self.flow, Flow::Legacy(_))
    }
}

#[async_trait]
impl Deployable for ExtensionDeploy<'_> {
    fn entity(&self) -> String {
        format!("{}/{}", self.cluster_name, self.extension.app())
    }

    fn is_satisfied(&self, state: &DeploymentState) -> Result<bool> {
        if !state.status(&self.cluster).deployed {
            return Err(Error::precondition(
                self.entity(),
                format!(
                    "Cannot install {} as cluster {} is not deployed",
                    self.extension.display_name(),
                    self.cluster_name
                ),
            ));
        }
        let slot = state.extension(&self.cluster, self.extension).ok_or_else(|| {
            Error::configuration(format!(
                "{} is not tracked on {}",
                self.extension.display_name(),
                self.cluster
            ))
        })?;
        if slot.deployed {
            info!(
                cluster = %self.cluster_name,
                "{} already deployed, skipping deployment",
                self.extension.display_name()
            );
        }
        Ok(slot.deployed)
    }

    async fn actuate(&self) -> Result<()> {
        match &self.flow {
            Flow::Package => self.install_package().await,
            Flow::Legacy(dirs) if self.extension == Extension::CertManager => {
                self.act
                    .extensions
                    .install_cert_manager(&self.cluster_name, &dirs.root)
                    .await
            }
            Flow::Legacy(dirs) => {
                self.act
                    .extensions
                    .deploy(
                        &self.cluster_name,
                        self.extension,
                        &dirs.dir,
                        self.values_file.clone(),
                    )
                    .await
            }
        }
    }

    fn convergence(&self) -> Option<PollBudget> {
        (!self.is_cert_manager_bundle()).then_some(RECONCILE_BUDGET)
    }

    async fn converged(&self) -> PollResult<()> {
        let status = match self.flow {
            Flow::Package => {
                self.act
                    .packages
                    .installed_status(
                        &self.cluster_name,
                        self.extension.app(),
                        &self.packages_namespace,
                    )
                    .await?
            }
            Flow::Legacy(_) => Some(
                self.act
                    .extensions
                    .status(&self.cluster_name, self.extension)
                    .await?,
            ),
        };
        reconcile_poll(self.extension, status)
    }

    fn record(&self, state: &mut DeploymentState) -> Result<()> {
        record_extension(state, &self.cluster, self.extension)
    }

    fn commit_message(&self) -> String {
        format!(
            "{} installation complete on {}",
            self.extension.display_name(),
            self.cluster_name
        )
    }
}

/// Map a reconcile status to a poll step. A failed reconcile stops polling.
pub(crate) fn reconcile_poll(extension: Extension, status: Option<ReconcileStatus>) -> PollResult<()> {
    match status {
        Some(ReconcileStatus::Succeeded) => Ok(Some(())),
        Some(ReconcileStatus::Failed(reason)) => Err(Error::actuation(extension.app(), reason)),
        Some(ReconcileStatus::Reconciling) | None => Ok(None),
    }
}

pub(crate) fn record_extension(
    state: &mut DeploymentState,
    cluster: &ClusterRef,
    extension: Extension,
) -> Result<()> {
    if state.record_extension_installed(cluster, extension) {
        Ok(())
    } else {
        Err(Error::configuration(format!(
            "{} is not tracked on {cluster}",
            extension.display_name()
        )))
    }
}

struct TmcAttach<'a> {
    act: &'a Actuators,
    cluster: ClusterRef,
    name: String,
    cluster_group: String,
    api_token: Option<String>,
}

#[async_trait]
impl Deployable for TmcAttach<'_> {
    fn entity(&self) -> String {
        self.name.clone()
    }

    fn is_satisfied(&self, state: &DeploymentState) -> Result<bool> {
        let integrations = state
            .integrations(&self.cluster)
            .filter(|_| state.status(&self.cluster).deployed)
            .ok_or_else(|| {
                Error::precondition(
                    &self.name,
                    format!("Cannot attach {} to TMC as it is not deployed", self.name),
                )
            })?;
        if integrations.tmc.attached {
            info!(cluster = %self.name, "Cluster is already attached to TMC");
        }
        Ok(integrations.tmc.attached)
    }

    async fn actuate(&self) -> Result<()> {
        self.act
            .tmc
            .attach(&self.name, &self.cluster_group, self.api_token.clone())
            .await
    }

    fn record(&self, state: &mut DeploymentState) -> Result<()> {
        let integrations = state.integrations_mut(&self.cluster).ok_or_else(|| {
            Error::configuration(format!("{} has no integrations", self.cluster))
        })?;
        integrations.tmc.attached = true;
        Ok(())
    }

    fn commit_message(&self) -> String {
        format!("Cluster attachment to Tmc completed for {}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use mockall::predicate::eq;
    use tempfile::TempDir;

    use crate::actuator::ClusterSummary;
    use crate::testutil::{context, seed, Mocks};

    fn summary(name: &str, roles: &[&str]) -> ClusterSummary {
        ClusterSummary {
            name: name.to_string(),
            namespace: "default".into(),
            status: "running".into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            kubernetes_version: None,
        }
    }

    #[tokio::test]
    async fn fresh_shared_cluster_deploys_and_labels() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.4.0");
        let mut mocks = Mocks::default();
        mocks.clusters.expect_exists().returning(|_| Ok(false));
        mocks
            .clusters
            .expect_create()
            .withf(|name, file| name == "shared" && file == Path::new("/tmp/shared.yml"))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut listed = 0;
        mocks.clusters.expect_list_all().times(2).returning(move || {
            listed += 1;
            if listed == 1 {
                Ok(vec![summary("shared", &[])])
            } else {
                Ok(vec![summary("shared", &[TANZU_SERVICES_ROLE])])
            }
        });
        mocks
            .clusters
            .expect_add_role_label()
            .with(eq("shared"), eq("mgmt"), eq(TANZU_SERVICES_ROLE))
            .times(1)
            .returning(|_, _, _| Ok(()));
        let act = mocks.build();

        let report = ClusterWorkflow::new(&ctx, &act)
            .deploy_cluster(&ClusterRef::SharedServices)
            .await;
        assert!(matches!(report.outcome, Outcome::Succeeded), "{report}");

        let state = ctx.store.load().unwrap();
        assert!(state.shared_services.deployed);
        assert_eq!(state.shared_services.version, "1.4.0");
        assert_eq!(state.shared_services.name, "shared");
    }

    #[tokio::test]
    async fn label_that_does_not_stick_fails_without_recording() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.4.0");
        let mut mocks = Mocks::default();
        mocks.clusters.expect_exists().returning(|_| Ok(false));
        mocks.clusters.expect_create().returning(|_, _| Ok(()));
        mocks
            .clusters
            .expect_list_all()
            .returning(|| Ok(vec![summary("shared", &[])]));
        mocks
            .clusters
            .expect_add_role_label()
            .returning(|_, _, _| Ok(()));
        let act = mocks.build();

        let report = ClusterWorkflow::new(&ctx, &act)
            .deploy_cluster(&ClusterRef::SharedServices)
            .await;
        assert!(report.failed());
        assert!(report.to_string().contains("Services label not set"));
        assert!(!ctx.store.load().unwrap().shared_services.deployed);
    }

    #[tokio::test]
    async fn converged_cluster_skips_without_actuation() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.3.1");
        seed(&ctx, |s| {
            s.record_cluster_deployed(&ClusterRef::SharedServices, "shared", "1.3.1")
        });
        let mut mocks = Mocks::default();
        mocks.clusters.expect_create().times(0);
        let act = mocks.build();

        let report = ClusterWorkflow::new(&ctx, &act)
            .deploy_cluster(&ClusterRef::SharedServices)
            .await;
        assert!(matches!(report.outcome, Outcome::Skipped));
    }

    #[tokio::test]
    async fn unsupported_target_fails_before_actuation() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.2.0");
        let mut mocks = Mocks::default();
        mocks.clusters.expect_create_management().times(0);
        let act = mocks.build();

        let report = ClusterWorkflow::new(&ctx, &act)
            .deploy_cluster(&ClusterRef::Management)
            .await;
        assert!(report.failed());
        assert!(report
            .to_string()
            .contains("Tanzu version(1.2.0) specified in desired state is unsupported"));
    }

    #[tokio::test]
    async fn legacy_release_installs_kapp_controller_after_create() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.3.1");
        let mut mocks = Mocks::default();
        mocks.clusters.expect_exists().returning(|_| Ok(false));
        mocks.clusters.expect_create().times(1).returning(|_, _| Ok(()));
        mocks
            .extensions
            .expect_install_kapp_controller()
            .withf(|name, dir| {
                name == "wl-1" && dir == Path::new("/tanzu/tkg-extensions-v1.3.1+vmware.1/extensions")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let act = mocks.build();

        let wl = ClusterRef::Workload("wl-1".into());
        let report = ClusterWorkflow::new(&ctx, &act).deploy_cluster(&wl).await;
        assert!(matches!(report.outcome, Outcome::Succeeded), "{report}");
        assert!(ctx.store.load().unwrap().workload("wl-1").unwrap().deployed);
    }

    #[tokio::test]
    async fn existing_cluster_without_record_is_adopted() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.4.0");
        let mut mocks = Mocks::default();
        mocks
            .clusters
            .expect_exists()
            .with(eq("wl-2"))
            .times(1)
            .returning(|_| Ok(true));
        mocks.clusters.expect_create().times(0);
        let act = mocks.build();

        let wl = ClusterRef::Workload("wl-2".into());
        let report = ClusterWorkflow::new(&ctx, &act).deploy_cluster(&wl).await;
        assert!(matches!(report.outcome, Outcome::Succeeded), "{report}");

        let state = ctx.store.load().unwrap();
        let recorded = state.workload("wl-2").unwrap();
        assert!(recorded.deployed);
        assert_eq!(recorded.version, "1.4.0");
    }

    #[tokio::test]
    async fn existing_shared_cluster_still_gets_its_label() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.4.0");
        let mut mocks = Mocks::default();
        mocks.clusters.expect_exists().returning(|_| Ok(true));
        mocks.clusters.expect_create().times(0);
        let mut listed = 0;
        mocks.clusters.expect_list_all().times(2).returning(move || {
            listed += 1;
            let roles: &[&str] = if listed == 1 { &[] } else { &[TANZU_SERVICES_ROLE] };
            Ok(vec![summary("shared", roles)])
        });
        mocks
            .clusters
            .expect_add_role_label()
            .times(1)
            .returning(|_, _, _| Ok(()));
        let act = mocks.build();

        let report = ClusterWorkflow::new(&ctx, &act)
            .deploy_cluster(&ClusterRef::SharedServices)
            .await;
        assert!(matches!(report.outcome, Outcome::Succeeded), "{report}");
        assert!(ctx.store.load().unwrap().shared_services.deployed);
    }

    #[tokio::test]
    async fn existing_legacy_cluster_still_gets_kapp_controller() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.3.1");
        let mut mocks = Mocks::default();
        mocks.clusters.expect_exists().returning(|_| Ok(true));
        mocks.clusters.expect_create().times(0);
        mocks
            .extensions
            .expect_install_kapp_controller()
            .times(1)
            .returning(|_, _| Ok(()));
        let act = mocks.build();

        let wl = ClusterRef::Workload("wl-1".into());
        let report = ClusterWorkflow::new(&ctx, &act).deploy_cluster(&wl).await;
        assert!(matches!(report.outcome, Outcome::Succeeded), "{report}");
    }

    #[tokio::test]
    async fn existing_management_cluster_is_not_recreated() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.4.0");
        let mut mocks = Mocks::default();
        mocks.clusters.expect_exists().with(eq("mgmt")).returning(|_| Ok(true));
        mocks.clusters.expect_create_management().times(0);
        let act = mocks.build();

        let report = ClusterWorkflow::new(&ctx, &act)
            .deploy_cluster(&ClusterRef::Management)
            .await;
        assert!(matches!(report.outcome, Outcome::Succeeded), "{report}");
        assert!(ctx.store.load().unwrap().management.deployed);
    }

    #[tokio::test(start_paused = true)]
    async fn package_flow_installs_highest_version_and_waits() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.4.0");
        seed(&ctx, |s| {
            s.record_cluster_deployed(&ClusterRef::SharedServices, "shared", "1.4.0")
        });
        let mut mocks = Mocks::default();
        mocks
            .packages
            .expect_list_available()
            .with(eq("shared"), eq("contour.tanzu.vmware.com"))
            .returning(|_, _| {
                Ok(vec![
                    "1.17.1+vmware.1-tkg.1".into(),
                    "1.18.2+vmware.1-tkg.1".into(),
                ])
            });
        mocks
            .packages
            .expect_install()
            .withf(|cluster, install| {
                cluster == "shared"
                    && install.version == "1.18.2+vmware.1-tkg.1"
                    && install.namespace == "tanzu-package-repo-global"
                    && install.values_file.as_deref()
                        == Some(Path::new("/tmp/contour-data-values.yml"))
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let mut polls = 0;
        mocks
            .packages
            .expect_installed_status()
            .returning(move |_, _, _| {
                polls += 1;
                Ok(match polls {
                    1 => None,
                    2 => Some(ReconcileStatus::Reconciling),
                    _ => Some(ReconcileStatus::Succeeded),
                })
            });
        let act = mocks.build();

        let report = ClusterWorkflow::new(&ctx, &act)
            .deploy_extension(&ClusterRef::SharedServices, Extension::Contour)
            .await;
        assert!(matches!(report.outcome, Outcome::Succeeded), "{report}");
        let state = ctx.store.load().unwrap();
        assert!(state.shared_services.extensions.contour.deployed);
        assert!(state.shared_services.extensions.contour.upgraded);
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.4.0");
        seed(&ctx, |s| {
            s.record_cluster_deployed(&ClusterRef::SharedServices, "shared", "1.4.0")
        });
        let mut mocks = Mocks::default();
        mocks
            .packages
            .expect_list_available()
            .returning(|_, _| Ok(vec!["2.3.3+vmware.1-tkg.1".into()]));
        mocks.packages.expect_install().returning(|_, _| Ok(()));
        mocks
            .packages
            .expect_installed_status()
            .times(1)
            .returning(|_, _, _| {
                Ok(Some(ReconcileStatus::Failed("Reconcile failed: harbor".into())))
            });
        let act = mocks.build();

        let report = ClusterWorkflow::new(&ctx, &act)
            .deploy_extension(&ClusterRef::SharedServices, Extension::Harbor)
            .await;
        assert!(report.failed());
        assert!(!ctx.store.load().unwrap().shared_services.extensions.harbor.deployed);
    }

    #[tokio::test]
    async fn absent_external_dns_block_skips() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.4.0");
        let mut mocks = Mocks::default();
        mocks.packages.expect_install().times(0);
        let act = mocks.build();

        let report = ClusterWorkflow::new(&ctx, &act)
            .deploy_extension(&ClusterRef::SharedServices, Extension::ExternalDns)
            .await;
        assert!(matches!(report.outcome, Outcome::Skipped));
    }

    #[tokio::test]
    async fn extension_on_undeployed_cluster_is_precondition_failure() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.4.0");
        let mut mocks = Mocks::default();
        mocks.packages.expect_install().times(0);
        let act = mocks.build();

        let report = ClusterWorkflow::new(&ctx, &act)
            .deploy_extension(&ClusterRef::Workload("wl-1".into()), Extension::Grafana)
            .await;
        match report.outcome {
            Outcome::Failed(e) => assert!(matches!(e, Error::Precondition { .. })),
            other => panic!("expected precondition failure, got {other}"),
        }
    }

    #[tokio::test]
    async fn tmc_attach_is_recorded_once() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.4.0");
        seed(&ctx, |s| {
            s.record_cluster_deployed(&ClusterRef::SharedServices, "shared", "1.4.0")
        });
        let mut mocks = Mocks::default();
        mocks
            .tmc
            .expect_attach()
            .withf(|name, group, token| name == "shared" && group == "default" && token.as_deref() == Some("token"))
            .times(1)
            .returning(|_, _, _| Ok(()));
        let act = mocks.build();
        let flow = ClusterWorkflow::new(&ctx, &act);

        let first = flow.attach_tmc(&ClusterRef::SharedServices).await;
        assert!(matches!(first.outcome, Outcome::Succeeded), "{first}");
        let second = flow.attach_tmc(&ClusterRef::SharedServices).await;
        assert!(matches!(second.outcome, Outcome::Skipped));
        assert!(ctx.store.load().unwrap().shared_services.integrations.tmc.attached);
    }
}
