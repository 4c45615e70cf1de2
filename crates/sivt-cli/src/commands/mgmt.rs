//! `sivt mgmt`: management cluster

use std::path::Path;

use clap::Subcommand;

use sivt_common::ClusterRef;
use sivt_workflow::{tier, Task};

use super::{finish, Session};
use crate::Result;

#[derive(Subcommand, Debug)]
pub enum MgmtCommand {
    /// Create the management cluster
    Deploy,
    /// Upgrade the management cluster to the desired version
    Upgrade,
}

impl MgmtCommand {
    fn task(&self) -> Task {
        match self {
            MgmtCommand::Deploy => Task::DeployCluster,
            MgmtCommand::Upgrade => Task::UpgradeCluster,
        }
    }
}

pub async fn run(root_dir: &Path, command: MgmtCommand) -> Result<()> {
    let session = Session::open(root_dir)?;
    let report = tier::run_task(
        &session.ctx,
        &session.act,
        &ClusterRef::Management,
        command.task(),
    )
    .await;
    finish(&[report])
}
