//! In-place upgrades: the cluster first, then its extensions.
//!
//! A cluster upgrade records `upgradedFrom` and clears every extension's
//! `upgraded` flag. Extension upgrades are ensure passes keyed off that
//! flag, so each runs exactly once after its cluster moved. The previous
//! release's bundle directory is located through `upgradedFrom`, falling
//! back to the current version for clusters that were never upgraded.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use sivt_common::{
    retry_with_backoff, ClusterRef, DeploymentState, Error, Extension, PollBudget, PollResult,
    Result, RetryConfig,
};

use crate::actuator::UpgradeOptions;
use crate::cluster::{reconcile_poll, record_extension, RECONCILE_BUDGET};
use crate::context::{Actuators, RunContext};
use crate::ensure::{ensure, Deployable, Outcome};
use crate::extensions::ExtensionDirs;
use crate::prevalidate::Decision;
use crate::task::{Task, TaskReport};

const EXISTS_ATTEMPTS: u32 = 6;
const EXISTS_DELAY: Duration = Duration::from_secs(10);

pub struct UpgradeOrchestrator<'a> {
    ctx: &'a RunContext,
    act: &'a Actuators,
}

impl<'a> UpgradeOrchestrator<'a> {
    pub fn new(ctx: &'a RunContext, act: &'a Actuators) -> Self {
        Self { ctx, act }
    }

    fn cluster_name(&self, cluster: &ClusterRef) -> Result<String> {
        self.ctx
            .spec
            .cluster(cluster)
            .map(|d| d.name.to_string())
            .ok_or_else(|| Error::configuration(format!("{cluster} cluster is not declared")))
    }

    /// Upgrade the cluster core. Skipped when it isn't deployed or is already
    /// on the desired version.
    pub async fn upgrade_cluster(&self, cluster: &ClusterRef) -> TaskReport {
        let name = match self.cluster_name(cluster) {
            Ok(name) => name,
            Err(e) => {
                return TaskReport::from_result(Task::UpgradeCluster, cluster.to_string(), Err(e))
            }
        };
        let result = self.try_upgrade_cluster(cluster, &name).await;
        TaskReport::from_result(Task::UpgradeCluster, name, result)
    }

    async fn try_upgrade_cluster(&self, cluster: &ClusterRef, name: &str) -> Result<bool> {
        let status = self.ctx.status(cluster)?;
        if !status.deployed {
            warn!(cluster = %name, "Cluster is not deployed, skipping upgrade");
            return Ok(false);
        }
        match self.ctx.prevalidate(cluster)? {
            Decision::Skip => {
                info!(cluster = %name, version = %status.version, "Cluster is already on the desired version");
                return Ok(false);
            }
            Decision::Fail(reason) => return Err(Error::configuration(reason)),
            Decision::Proceed => {}
        }

        let target = self.ctx.target_version();
        info!(cluster = %name, from = %status.version, to = %target, "Upgrading cluster");
        let options = UpgradeOptions {
            bom_image_tag: self.ctx.desired.bom_image_tag.clone(),
            timeout: None,
        };
        let clusters = &self.act.clusters;
        match cluster {
            ClusterRef::Management => clusters.upgrade_management(name, &options).await?,
            _ => {
                clusters
                    .upgrade(name, self.ctx.management_name(), &options)
                    .await?
            }
        }

        verify_upgraded(self.act, name).await?;

        let message = match cluster {
            ClusterRef::Management => format!("Successful management cluster upgrade [{name}]"),
            ClusterRef::SharedServices => format!("Successful Shared Cluster upgrade [{name}]"),
            ClusterRef::Workload(_) => format!("Successful workload cluster upgrade [{name}]"),
        };
        self.ctx.store.update(&message, |state| {
            state.record_cluster_upgraded(cluster, target);
            Ok(())
        })?;
        info!(cluster = %name, version = %target, "Cluster upgraded");
        Ok(true)
    }

    /// Upgrade one extension of an already-upgraded cluster
    pub async fn upgrade_extension(&self, cluster: &ClusterRef, extension: Extension) -> TaskReport {
        let task = Task::Upgrade(extension);
        let name = match self.cluster_name(cluster) {
            Ok(name) => name,
            Err(e) => return TaskReport::from_result(task, cluster.to_string(), Err(e)),
        };
        let entity = format!("{name}/{}", extension.app());

        if !self.ctx.spec.has_extensions_spec(cluster) {
            warn!(cluster = %name, "extensionsSpec not found, no extensions will be upgraded");
            return TaskReport::new(task, entity, Outcome::Skipped);
        }
        if self.ctx.spec.extension(cluster, extension).is_none() {
            info!(cluster = %name, extension = %extension, "Spec not found, skipping upgrade");
            return TaskReport::new(task, entity, Outcome::Skipped);
        }

        let item = match self.extension_upgrade(cluster, &name, extension) {
            Ok(item) => item,
            Err(e) => return TaskReport::from_result(task, entity, Err(e)),
        };
        TaskReport::new(task, entity, ensure(&self.ctx.store, &item).await)
    }

    fn extension_upgrade(
        &self,
        cluster: &ClusterRef,
        name: &str,
        extension: Extension,
    ) -> Result<ExtensionUpgrade<'a>> {
        let status = self.ctx.status(cluster)?;
        let target = self.ctx.target_version();
        Ok(ExtensionUpgrade {
            ctx: self.ctx,
            act: self.act,
            cluster: cluster.clone(),
            cluster_name: name.to_string(),
            extension,
            target: target.to_string(),
            previous: ExtensionDirs::for_version(status.previous_version())?,
            current: ExtensionDirs::for_version(target)?,
        })
    }

    /// Cluster first, then `extensions` in dependency order. The first
    /// failure aborts the rest of the chain.
    pub async fn upgrade_all(&self, cluster: &ClusterRef, extensions: &[Extension]) -> Vec<TaskReport> {
        let mut reports = vec![self.upgrade_cluster(cluster).await];
        if reports[0].failed() {
            return reports;
        }
        // a cluster that was never deployed has no extensions to carry forward
        if !self.ctx.status(cluster).is_ok_and(|s| s.deployed) {
            return reports;
        }

        let mut ordered = extensions.to_vec();
        ordered.sort_by_key(|e| e.upgrade_rank());
        for extension in ordered {
            let report = self.upgrade_extension(cluster, extension).await;
            let failed = report.failed();
            reports.push(report);
            if failed {
                break;
            }
        }
        reports
    }
}

/// Retriable existence check followed by a health check
async fn verify_upgraded(act: &Actuators, name: &str) -> Result<()> {
    retry_with_backoff(
        &RetryConfig::fixed(EXISTS_ATTEMPTS, EXISTS_DELAY),
        "cluster exists",
        || async move {
            if act.clusters.exists(name).await? {
                Ok(())
            } else {
                Err(Error::actuation(
                    name,
                    format!("Cluster: {name} not in running state"),
                ))
            }
        },
    )
    .await?;

    let healthy = act
        .clusters
        .list_all()
        .await?
        .iter()
        .any(|c| c.name == name && c.is_running());
    if !healthy {
        return Err(Error::actuation(name, format!("{name} failed to upgrade")));
    }
    Ok(())
}

struct ExtensionUpgrade<'a> {
    ctx: &'a RunContext,
    act: &'a Actuators,
    cluster: ClusterRef,
    cluster_name: String,
    extension: Extension,
    target: String,
    previous: ExtensionDirs,
    current: ExtensionDirs,
}

impl ExtensionUpgrade<'_> {
    /// Legacy manager removal, kapp-controller and cert-manager. Runs once per
    /// cluster upgrade, guarded by the cert-manager slot.
    async fn prerequisites(&self) -> Result<()> {
        let done = self
            .ctx
            .store
            .load()?
            .extension(&self.cluster, Extension::CertManager)
            .is_some_and(|s| s.upgraded);
        if done {
            return Ok(());
        }

        let extensions = &self.act.extensions;
        let cluster = self.cluster_name.as_str();
        extensions
            .delete_legacy_manager(cluster, &self.previous.dir)
            .await?;
        extensions
            .install_kapp_controller(cluster, &self.current.dir)
            .await?;
        extensions
            .install_cert_manager(cluster, &self.current.root)
            .await?;
        self.ctx.store.update(
            &format!("Cert Manager upgrade complete on {cluster}"),
            |state| record_extension(state, &self.cluster, Extension::CertManager),
        )?;
        info!(cluster, "Extension prerequisites upgraded");
        Ok(())
    }
}

#[async_trait]
impl Deployable for ExtensionUpgrade<'_> {
    fn entity(&self) -> String {
        format!("{}/{}", self.cluster_name, self.extension.app())
    }

    fn is_satisfied(&self, state: &DeploymentState) -> Result<bool> {
        let status = state.status(&self.cluster);
        if status.version != self.target {
            return Err(Error::precondition(
                self.entity(),
                format!(
                    "Cannot upgrade {} before cluster {} is upgraded to {}",
                    self.extension.display_name(),
                    self.cluster_name,
                    self.target
                ),
            ));
        }
        let slot = state
            .extension(&self.cluster, self.extension)
            .filter(|s| s.deployed)
            .ok_or_else(|| {
                Error::precondition(
                    self.entity(),
                    format!(
                        "Cannot upgrade {} as it is not deployed",
                        self.extension.display_name()
                    ),
                )
            })?;
        if slot.upgraded {
            info!(
                cluster = %self.cluster_name,
                "{} extension already upgraded, skipping upgrade",
                self.extension.display_name()
            );
        }
        Ok(slot.upgraded)
    }

    async fn actuate(&self) -> Result<()> {
        self.prerequisites().await?;
        if self.extension == Extension::CertManager {
            return Ok(());
        }

        let extensions = &self.act.extensions;
        extensions
            .migrate_data_values(
                &self.cluster_name,
                self.extension,
                &self.previous.dir,
                &self.current.dir,
            )
            .await?;
        extensions
            .reconcile(&self.cluster_name, self.extension, &self.current.dir)
            .await
    }

    fn convergence(&self) -> Option<PollBudget> {
        (self.extension != Extension::CertManager).then_some(RECONCILE_BUDGET)
    }

    async fn converged(&self) -> PollResult<()> {
        let status = self
            .act
            .extensions
            .status(&self.cluster_name, self.extension)
            .await?;
        reconcile_poll(self.extension, Some(status))
    }

    fn record(&self, state: &mut DeploymentState) -> Result<()> {
        record_extension(state, &self.cluster, self.extension)
    }

    fn commit_message(&self) -> String {
        format!(
            "{} upgrade complete on {}",
            self.extension.display_name(),
            self.cluster_name
        )
    }
}
