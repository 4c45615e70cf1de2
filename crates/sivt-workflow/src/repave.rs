//! Rolling replacement of a cluster's oldest node.
//!
//! ```text
//! Idle -> Validating -> Draining -> Deleting -> AwaitingReplacement -> Converged
//!              \            \           \                \
//!               +------------+-----------+----------------+--> Failed
//! ```
//!
//! The machine never re-drives a drain; retrying evictions is the drain
//! primitive's job. One cluster per machine.

use std::fmt;
use std::time::Duration;

use tracing::{error, info};

use sivt_common::{poll_attempts, ClusterRef, Error, Result};

use crate::actuator::{NodeActuator, NodeInfo};
use crate::context::{Actuators, RunContext};
use crate::ensure::Outcome;
use crate::task::{Task, TaskReport};

/// Polls of the Ready worker count while waiting for the replacement
pub const REPLACEMENT_POLLS: u32 = 20;
pub const REPLACEMENT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepaveState {
    Idle,
    Validating,
    Draining { node: String, expected: usize },
    Deleting { node: String, expected: usize },
    AwaitingReplacement { node: String, expected: usize },
    Converged { replaced: String },
    Failed(String),
}

impl RepaveState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RepaveState::Converged { .. } | RepaveState::Failed(_))
    }
}

impl fmt::Display for RepaveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepaveState::Idle => f.write_str("Idle"),
            RepaveState::Validating => f.write_str("Validating"),
            RepaveState::Draining { node, .. } => write!(f, "Draining({node})"),
            RepaveState::Deleting { node, .. } => write!(f, "Deleting({node})"),
            RepaveState::AwaitingReplacement { node, .. } => {
                write!(f, "AwaitingReplacement({node})")
            }
            RepaveState::Converged { replaced } => write!(f, "Converged({replaced})"),
            RepaveState::Failed(reason) => write!(f, "Failed({reason})"),
        }
    }
}

/// Oldest node by creation time, ties broken by name
pub fn oldest(nodes: &[NodeInfo]) -> Option<&NodeInfo> {
    nodes
        .iter()
        .min_by(|a, b| a.created.cmp(&b.created).then_with(|| a.name.cmp(&b.name)))
}

pub struct RepaveMachine<'a> {
    nodes: &'a dyn NodeActuator,
    cluster: String,
    state: RepaveState,
    polls: u32,
    interval: Duration,
}

impl<'a> RepaveMachine<'a> {
    pub fn new(nodes: &'a dyn NodeActuator, cluster: impl Into<String>) -> Self {
        Self {
            nodes,
            cluster: cluster.into(),
            state: RepaveState::Idle,
            polls: REPLACEMENT_POLLS,
            interval: REPLACEMENT_INTERVAL,
        }
    }

    pub fn state(&self) -> &RepaveState {
        &self.state
    }

    /// Advance one transition. An error moves the machine to `Failed`.
    pub async fn step(&mut self) -> Result<()> {
        let current = std::mem::replace(&mut self.state, RepaveState::Idle);
        let next = match self.transition(current).await {
            Ok(next) => next,
            Err(e) => {
                error!(cluster = %self.cluster, error = %e, "Repave failed");
                self.state = RepaveState::Failed(e.to_string());
                return Err(e);
            }
        };
        info!(cluster = %self.cluster, state = %next, "Repave transition");
        self.state = next;
        Ok(())
    }

    async fn transition(&self, current: RepaveState) -> Result<RepaveState> {
        let cluster = self.cluster.as_str();
        match current {
            RepaveState::Idle => Ok(RepaveState::Validating),
            RepaveState::Validating => {
                let total = self.nodes.total(cluster).await?;
                if total <= 1 {
                    return Err(Error::precondition(
                        cluster,
                        format!("Insufficient Nodes, node_count = {total}"),
                    ));
                }
                let expected = self.nodes.ready_workers(cluster).await?;
                let nodes = self.nodes.list_nodes(cluster).await?;
                let node = oldest(&nodes).ok_or_else(|| {
                    Error::actuation(cluster, "node list is empty")
                })?;
                Ok(RepaveState::Draining {
                    node: node.name.clone(),
                    expected,
                })
            }
            RepaveState::Draining { node, expected } => {
                self.nodes.drain(cluster, &node).await?;
                Ok(RepaveState::Deleting { node, expected })
            }
            RepaveState::Deleting { node, expected } => {
                self.nodes.delete(cluster, &node).await?;
                Ok(RepaveState::AwaitingReplacement { node, expected })
            }
            RepaveState::AwaitingReplacement { node, expected } => {
                let nodes = self.nodes;
                let joined = poll_attempts(self.polls, self.interval, "replacement node", || async move {
                    let count = nodes.ready_workers(cluster).await?;
                    Ok((count >= expected).then_some(count))
                })
                .await;
                match joined {
                    Ok(_) => Ok(RepaveState::Converged { replaced: node }),
                    Err(Error::Timeout { .. }) => Err(Error::actuation(
                        cluster,
                        "replacement node did not join in time",
                    )),
                    Err(e) => Err(e),
                }
            }
            terminal @ (RepaveState::Converged { .. } | RepaveState::Failed(_)) => Ok(terminal),
        }
    }

    /// Drive the machine to a terminal state. Returns the replaced node.
    pub async fn run(mut self) -> Result<String> {
        info!(cluster = %self.cluster, "Repaving cluster");
        while !self.state.is_terminal() {
            self.step().await?;
        }
        match self.state {
            RepaveState::Converged { replaced } => {
                info!(cluster = %self.cluster, node = %replaced, "Repave complete");
                Ok(replaced)
            }
            RepaveState::Failed(reason) => Err(Error::actuation(self.cluster, reason)),
            other => Err(Error::actuation(
                self.cluster,
                format!("repave stopped in state {other}"),
            )),
        }
    }
}

/// Repave `cluster` if its spec enables it and every cluster is deployed
pub async fn repave_cluster(ctx: &RunContext, act: &Actuators, cluster: &ClusterRef) -> TaskReport {
    let Some(decl) = ctx.spec.cluster(cluster) else {
        let err = Error::configuration(format!("{cluster} cluster is not declared"));
        return TaskReport::from_result(Task::Repave, cluster.to_string(), Err(err));
    };
    let name = decl.name.to_string();
    if !decl.repave {
        info!(cluster = %name, "Repave is disabled");
        return TaskReport::new(Task::Repave, name, Outcome::Skipped);
    }

    let state = match ctx.store.load() {
        Ok(state) => state,
        Err(e) => return TaskReport::from_result(Task::Repave, name, Err(e)),
    };
    if !state.all_clusters_deployed(&ctx.spec.workload_names()) {
        info!(cluster = %name, "Clusters are not deployed, skipping repave");
        return TaskReport::new(Task::Repave, name, Outcome::Skipped);
    }

    let result = RepaveMachine::new(act.nodes.as_ref(), name.as_str())
        .run()
        .await
        .map(|_| true);
    TaskReport::from_result(Task::Repave, name, result)
}
