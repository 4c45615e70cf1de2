//! `sivt workload-clusters`: every declared workload cluster, one at a time

use std::path::Path;

use clap::Subcommand;

use sivt_common::Extension;
use sivt_workflow::{tier, Task};

use super::{finish, Session};
use crate::Result;

#[derive(Subcommand, Debug)]
pub enum WorkloadCommand {
    /// Create each workload cluster
    Deploy,
    DeployCertMgr,
    DeployContour,
    DeployPrometheus,
    DeployGrafana,
    AttachClusterToTmc,
    /// Upgrade each cluster, then contour, prometheus and grafana
    Upgrade,
    /// Replace the oldest worker node of each cluster with repave enabled
    Repave,
}

impl WorkloadCommand {
    /// Per-cluster task; `None` for the chained upgrade
    fn task(&self) -> Option<Task> {
        use WorkloadCommand::*;
        match self {
            Deploy => Some(Task::DeployCluster),
            DeployCertMgr => Some(Task::Deploy(Extension::CertManager)),
            DeployContour => Some(Task::Deploy(Extension::Contour)),
            DeployPrometheus => Some(Task::Deploy(Extension::Prometheus)),
            DeployGrafana => Some(Task::Deploy(Extension::Grafana)),
            AttachClusterToTmc => Some(Task::AttachClusterToTmc),
            Upgrade => None,
            Repave => Some(Task::Repave),
        }
    }
}

pub async fn run(root_dir: &Path, command: WorkloadCommand) -> Result<()> {
    let session = Session::open(root_dir)?;
    let reports = match command.task() {
        Some(task) => tier::for_each_workload(&session.ctx, &session.act, task).await,
        None => tier::upgrade_workloads(&session.ctx, &session.act).await,
    };
    finish(&reports)
}
