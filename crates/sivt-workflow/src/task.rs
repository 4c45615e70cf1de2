//! Task vocabulary and per-task reporting

use std::fmt;

use tracing::{error, info};

use sivt_common::{Extension, Result};

use crate::ensure::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    DeployLoadBalancer,
    DeployCluster,
    UpgradeCluster,
    Deploy(Extension),
    Upgrade(Extension),
    AttachClusterToTmc,
    Repave,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::DeployLoadBalancer => f.write_str("deploy-load-balancer"),
            Task::DeployCluster => f.write_str("deploy-cluster"),
            Task::UpgradeCluster => f.write_str("upgrade-cluster"),
            Task::Deploy(ext) => write!(f, "deploy-{ext}"),
            Task::Upgrade(ext) => write!(f, "upgrade-{ext}"),
            Task::AttachClusterToTmc => f.write_str("attach-cluster-to-tmc"),
            Task::Repave => f.write_str("repave"),
        }
    }
}

/// Result of one task against one entity
#[derive(Debug)]
pub struct TaskReport {
    pub task: Task,
    pub entity: String,
    pub outcome: Outcome,
}

impl TaskReport {
    pub fn new(task: Task, entity: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            task,
            entity: entity.into(),
            outcome,
        }
    }

    /// Wrap a plain result: `Ok(true)` did work, `Ok(false)` had nothing to do
    pub fn from_result(task: Task, entity: impl Into<String>, result: Result<bool>) -> Self {
        let entity = entity.into();
        let outcome = match result {
            Ok(true) => Outcome::Succeeded,
            Ok(false) => Outcome::Skipped,
            Err(e) => Outcome::Failed(e.in_entity(&entity)),
        };
        Self::new(task, entity, outcome)
    }

    pub fn failed(&self) -> bool {
        self.outcome.is_failed()
    }

    /// Log the report line at a level matching the outcome
    pub fn log(&self) {
        if self.failed() {
            error!(task = %self.task, entity = %self.entity, "{}", self.outcome);
        } else {
            info!(task = %self.task, entity = %self.entity, "{}", self.outcome);
        }
    }
}

impl fmt::Display for TaskReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.task, self.entity, self.outcome)
    }
}

/// Number of failed reports
pub fn failures(reports: &[TaskReport]) -> usize {
    reports.iter().filter(|r| r.failed()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sivt_common::Error;

    #[test]
    fn report_lines_name_task_entity_and_outcome() {
        let ok = TaskReport::new(Task::Deploy(Extension::Contour), "shared", Outcome::Succeeded);
        assert_eq!(ok.to_string(), "deploy-contour [shared]: SUCCEEDED");

        let bad = TaskReport::from_result(
            Task::Repave,
            "wl-1",
            Err(Error::precondition("wl-1", "Insufficient Nodes, node_count = 1")),
        );
        assert!(bad.failed());
        assert!(bad.to_string().contains("Insufficient Nodes"));
        assert_eq!(failures(&[ok, bad]), 1);
    }

    #[test]
    fn from_result_maps_skip_and_success() {
        assert!(matches!(
            TaskReport::from_result(Task::UpgradeCluster, "mgmt", Ok(false)).outcome,
            Outcome::Skipped
        ));
        assert!(matches!(
            TaskReport::from_result(Task::UpgradeCluster, "mgmt", Ok(true)).outcome,
            Outcome::Succeeded
        ));
    }
}
