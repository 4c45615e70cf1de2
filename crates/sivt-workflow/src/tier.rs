//! Task dispatch for one cluster and fan-out over the workload tier.
//!
//! Workload clusters are independent: one cluster's failure is reported and
//! the next cluster still runs.

use tracing::info;

use sivt_common::{ClusterRef, Extension};

use crate::alb;
use crate::cluster::ClusterWorkflow;
use crate::context::{Actuators, RunContext};
use crate::repave;
use crate::task::{Task, TaskReport};
use crate::upgrade::UpgradeOrchestrator;

/// Extensions upgraded after a workload cluster, in order
pub const WORKLOAD_UPGRADE_CHAIN: [Extension; 3] =
    [Extension::Contour, Extension::Prometheus, Extension::Grafana];

/// Run `task` against `cluster` and log its report line
pub async fn run_task(ctx: &RunContext, act: &Actuators, cluster: &ClusterRef, task: Task) -> TaskReport {
    let workflow = ClusterWorkflow::new(ctx, act);
    let orchestrator = UpgradeOrchestrator::new(ctx, act);

    let report = match task {
        Task::DeployLoadBalancer => alb::deploy_load_balancer(ctx, act).await,
        Task::DeployCluster => workflow.deploy_cluster(cluster).await,
        Task::Deploy(extension) => workflow.deploy_extension(cluster, extension).await,
        Task::AttachClusterToTmc => workflow.attach_tmc(cluster).await,
        Task::UpgradeCluster => orchestrator.upgrade_cluster(cluster).await,
        Task::Upgrade(extension) => orchestrator.upgrade_extension(cluster, extension).await,
        Task::Repave => repave::repave_cluster(ctx, act, cluster).await,
    };
    report.log();
    report
}

fn workload_clusters(ctx: &RunContext) -> Vec<ClusterRef> {
    let names = ctx.spec.workload_names();
    if names.is_empty() {
        info!("No workload clusters declared");
    }
    names
        .into_iter()
        .map(|n| ClusterRef::Workload(n.to_string()))
        .collect()
}

/// Run `task` on every declared workload cluster in declaration order
pub async fn for_each_workload(ctx: &RunContext, act: &Actuators, task: Task) -> Vec<TaskReport> {
    let mut reports = Vec::new();
    for cluster in workload_clusters(ctx) {
        reports.push(run_task(ctx, act, &cluster, task).await);
    }
    reports
}

/// Cluster upgrade followed by its extension chain, per workload cluster
pub async fn upgrade_workloads(ctx: &RunContext, act: &Actuators) -> Vec<TaskReport> {
    let orchestrator = UpgradeOrchestrator::new(ctx, act);
    let mut reports = Vec::new();
    for cluster in workload_clusters(ctx) {
        for report in orchestrator
            .upgrade_all(&cluster, &WORKLOAD_UPGRADE_CHAIN)
            .await
        {
            report.log();
            reports.push(report);
        }
    }
    reports
}
