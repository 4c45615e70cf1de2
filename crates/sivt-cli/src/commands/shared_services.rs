//! `sivt shared-services`: the shared services cluster and its extensions

use std::path::Path;

use clap::Subcommand;

use sivt_common::{ClusterRef, Extension};
use sivt_workflow::{tier, Task};

use super::{finish, Session};
use crate::Result;

#[derive(Subcommand, Debug)]
pub enum SharedServicesCommand {
    /// Create the cluster and label it as the tanzu-services cluster
    DeployCluster,
    DeployCertMgr,
    DeployContour,
    DeployExternalDns,
    DeployHarbor,
    /// Attach the cluster to Tanzu Mission Control
    AttachClusterToTmc,
    UpgradeCluster,
    UpgradeContour,
    UpgradeExternalDns,
    UpgradeHarbor,
    /// Replace the oldest worker node
    Repave,
}

impl SharedServicesCommand {
    fn task(&self) -> Task {
        use SharedServicesCommand::*;
        match self {
            DeployCluster => Task::DeployCluster,
            DeployCertMgr => Task::Deploy(Extension::CertManager),
            DeployContour => Task::Deploy(Extension::Contour),
            DeployExternalDns => Task::Deploy(Extension::ExternalDns),
            DeployHarbor => Task::Deploy(Extension::Harbor),
            AttachClusterToTmc => Task::AttachClusterToTmc,
            UpgradeCluster => Task::UpgradeCluster,
            UpgradeContour => Task::Upgrade(Extension::Contour),
            UpgradeExternalDns => Task::Upgrade(Extension::ExternalDns),
            UpgradeHarbor => Task::Upgrade(Extension::Harbor),
            Repave => Task::Repave,
        }
    }
}

pub async fn run(root_dir: &Path, command: SharedServicesCommand) -> Result<()> {
    let session = Session::open(root_dir)?;
    let report = tier::run_task(
        &session.ctx,
        &session.act,
        &ClusterRef::SharedServices,
        command.task(),
    )
    .await;
    finish(&[report])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcommands_map_to_tasks() {
        assert_eq!(
            SharedServicesCommand::DeployExternalDns.task(),
            Task::Deploy(Extension::ExternalDns)
        );
        assert_eq!(
            SharedServicesCommand::UpgradeHarbor.task(),
            Task::Upgrade(Extension::Harbor)
        );
        assert_eq!(SharedServicesCommand::Repave.task(), Task::Repave);
    }
}
